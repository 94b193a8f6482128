use std::fs;
use std::io;
use std::path::Path;

use anyhow::Context;
use desk_logging::desk_info;
use overlay_engine::ChatConfig;

/// Load the overlay settings file. A missing file falls back to defaults;
/// a file that exists but does not parse is a startup error.
pub fn load_settings(path: &Path) -> anyhow::Result<ChatConfig> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            desk_info!("no settings file at {path:?}, using defaults");
            return Ok(ChatConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("reading settings from {path:?}"));
        }
    };
    ron::from_str(&content).with_context(|| format!("parsing settings from {path:?}"))
}
