use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use desk_logging::desk_error;
use url::Url;

use crate::fetch::{FetchSettings, PageFetcher};
use crate::harvest::{HarvestRules, PageWatcher, WatchSettings};
use crate::policy::HttpPolicyGate;
use crate::sequencer::{DownloadSequencer, SequencerSettings};
use crate::types::{BatchReport, ChannelProgressSink, EngineEvent};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub fetch: FetchSettings,
    pub rules: HarvestRules,
    pub watch: WatchSettings,
    pub sequencer: SequencerSettings,
    /// Explicit policy-file location; defaults to the target's origin.
    pub policy_url: Option<Url>,
}

enum EngineCommand {
    Collect { page_url: Url },
}

/// Commands in, events out; the worker thread owns a tokio runtime and
/// runs batches one at a time.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    desk_error!("cannot start engine runtime: {err}");
                    let _ = event_tx.send(EngineEvent::BatchFailed {
                        message: err.to_string(),
                    });
                    return;
                }
            };
            while let Ok(command) = cmd_rx.recv() {
                // One batch at a time; the next command waits its turn.
                runtime.block_on(handle_command(&config, command, &event_tx));
            }
        });

        Self { cmd_tx, event_rx }
    }

    /// Scan `page_url` for document links and download them in order.
    pub fn collect(&self, page_url: Url) {
        let _ = self.cmd_tx.send(EngineCommand::Collect { page_url });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Blocks until the next event; `None` once the engine is gone.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

async fn handle_command(
    config: &EngineConfig,
    command: EngineCommand,
    event_tx: &mpsc::Sender<EngineEvent>,
) {
    match command {
        EngineCommand::Collect { page_url } => {
            let gate = match HttpPolicyGate::new(&config.fetch, config.policy_url.clone()) {
                Ok(gate) => gate,
                Err(err) => {
                    let _ = event_tx.send(EngineEvent::BatchFailed {
                        message: err.to_string(),
                    });
                    return;
                }
            };

            let watcher = PageWatcher::new(
                PageFetcher::new(config.fetch.clone()),
                config.rules.clone(),
                config.watch.clone(),
            );
            let links = watcher.harvest(&page_url).await;
            let _ = event_tx.send(EngineEvent::PageScanned {
                link_count: links.len(),
            });
            if links.is_empty() {
                let _ = event_tx.send(EngineEvent::BatchFinished {
                    report: BatchReport::default(),
                });
                return;
            }

            let sequencer =
                DownloadSequencer::new(config.fetch.clone(), config.sequencer.clone());
            let sink = ChannelProgressSink::new(event_tx.clone());
            match sequencer.run(&links, &gate, &sink).await {
                Ok(report) => {
                    let _ = event_tx.send(EngineEvent::BatchFinished { report });
                }
                Err(err) => {
                    let _ = event_tx.send(EngineEvent::BatchFailed {
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}
