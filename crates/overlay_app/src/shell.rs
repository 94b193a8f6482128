use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use desk_logging::{desk_info, desk_warn};
use overlay_core::{update, ChatState, Msg};
use overlay_engine::ConfigHandle;

use crate::effects::EffectRunner;
use crate::render::Renderer;
use crate::settings;

/// Line-oriented shell around the conversation core. Plain lines are chat
/// messages; `:clear`, `:reload` and `:quit` are shell commands.
pub fn run(config: Arc<ConfigHandle>, settings_path: PathBuf) -> anyhow::Result<()> {
    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let runner = EffectRunner::new(config.clone(), msg_tx.clone());
    let shutdown = Arc::new(AtomicBool::new(false));

    spawn_input_reader(config, settings_path, msg_tx, shutdown.clone());

    let mut state = ChatState::new();
    let mut renderer = Renderer::new();
    while !shutdown.load(Ordering::Relaxed) {
        let msg = match msg_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(msg) => msg,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };
        let (next, effects) = update(std::mem::take(&mut state), msg);
        state = next;
        runner.enqueue(effects);
        if state.consume_dirty() {
            renderer.apply(&state.view());
        }
    }
    desk_info!("overlay shell exiting");
    Ok(())
}

fn spawn_input_reader(
    config: Arc<ConfigHandle>,
    settings_path: PathBuf,
    msg_tx: mpsc::Sender<Msg>,
    shutdown: Arc<AtomicBool>,
) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim().to_string();
            match line.as_str() {
                ":quit" => break,
                ":clear" => {
                    if msg_tx.send(Msg::ClearRequested).is_err() {
                        break;
                    }
                }
                ":reload" => reload_settings(&config, &settings_path),
                _ => {
                    if msg_tx.send(Msg::DraftChanged(line)).is_err()
                        || msg_tx.send(Msg::DraftSubmitted).is_err()
                    {
                        break;
                    }
                }
            }
        }
        shutdown.store(true, Ordering::Relaxed);
        // Wake the main loop if it is waiting on the queue.
        let _ = msg_tx.send(Msg::NoOp);
    });
}

/// Re-reads the settings file and installs it atomically; running calls
/// keep the snapshot they started with.
fn reload_settings(config: &ConfigHandle, settings_path: &Path) {
    match settings::load_settings(settings_path) {
        Ok(fresh) => {
            let hotkey = fresh.hotkey.clone();
            let previous = config.replace(fresh);
            if previous.hotkey != hotkey {
                // The binding is replaced outright, not merged.
                desk_info!("hotkey rebound: {} -> {}", previous.hotkey, hotkey);
            }
            desk_info!("settings reloaded from {settings_path:?}");
        }
        Err(err) => desk_warn!("keeping current settings: {err:#}"),
    }
}
