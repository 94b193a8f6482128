mod effects;
mod render;
mod settings;
mod shell;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use desk_logging::{desk_info, LogDestination};
use overlay_engine::ConfigHandle;

fn main() -> anyhow::Result<()> {
    // Keep stdout clean for the conversation; logs go to the file.
    desk_logging::initialize(LogDestination::File(Path::new("./overlay.log")));

    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./overlay.ron"));
    let config = settings::load_settings(&settings_path)?;
    desk_info!(
        "overlay starting: endpoint={} hotkey={}",
        config.api_url,
        config.hotkey
    );

    let handle = Arc::new(ConfigHandle::new(config));
    shell::run(handle, settings_path)
}
