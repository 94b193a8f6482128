use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use desk_logging::{desk_debug, desk_error, desk_warn};
use futures_util::StreamExt;

use crate::config::{ChatConfig, HttpMethod};
use crate::sse::{self, SseLine};
use crate::types::{ChatMessage, ChatRequest, StreamEvent, StreamId};

enum ChatCommand {
    Start {
        stream: StreamId,
        config: Arc<ChatConfig>,
        messages: Vec<ChatMessage>,
    },
}

/// Streaming completions behind command/event channels. Each call runs on
/// the worker runtime; its events are tagged with the caller's stream id.
///
/// Overlapping calls are not prevented here; the consumer decides what to
/// do with events from a stream it no longer considers active.
pub struct ChatHandle {
    cmd_tx: mpsc::Sender<ChatCommand>,
    event_rx: Mutex<mpsc::Receiver<(StreamId, StreamEvent)>>,
}

impl ChatHandle {
    pub fn new() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<ChatCommand>();
        let (event_tx, event_rx) = mpsc::channel::<(StreamId, StreamEvent)>();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    desk_error!("cannot start chat runtime: {err}");
                    return;
                }
            };
            while let Ok(command) = cmd_rx.recv() {
                let ChatCommand::Start {
                    stream,
                    config,
                    messages,
                } = command;
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    run_stream(stream, config, messages, event_tx).await;
                });
            }
        });

        Self {
            cmd_tx,
            event_rx: Mutex::new(event_rx),
        }
    }

    pub fn start(&self, stream: StreamId, config: Arc<ChatConfig>, messages: Vec<ChatMessage>) {
        let _ = self.cmd_tx.send(ChatCommand::Start {
            stream,
            config,
            messages,
        });
    }

    pub fn try_recv(&self) -> Option<(StreamId, StreamEvent)> {
        self.event_rx.lock().expect("event channel lock").try_recv().ok()
    }

    /// Blocks until the next event; `None` once the worker is gone.
    pub fn recv(&self) -> Option<(StreamId, StreamEvent)> {
        self.event_rx.lock().expect("event channel lock").recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<(StreamId, StreamEvent)> {
        self.event_rx
            .lock()
            .expect("event channel lock")
            .recv_timeout(timeout)
            .ok()
    }
}

impl Default for ChatHandle {
    fn default() -> Self {
        Self::new()
    }
}

struct StreamFailure {
    status: Option<u16>,
    detail: String,
}

async fn run_stream(
    stream: StreamId,
    config: Arc<ChatConfig>,
    messages: Vec<ChatMessage>,
    event_tx: mpsc::Sender<(StreamId, StreamEvent)>,
) {
    if let Err(failure) = drive_stream(stream, &config, messages, &event_tx).await {
        let _ = event_tx.send((
            stream,
            StreamEvent::Failed {
                status: failure.status,
                detail: failure.detail,
            },
        ));
    }
    // The terminal notification fires exactly once, whatever path got us
    // here: done sentinel, natural end of body, HTTP failure, transport
    // error.
    let _ = event_tx.send((stream, StreamEvent::Finished));
}

async fn drive_stream(
    stream: StreamId,
    config: &ChatConfig,
    messages: Vec<ChatMessage>,
    event_tx: &mpsc::Sender<(StreamId, StreamEvent)>,
) -> Result<(), StreamFailure> {
    let client = reqwest::Client::new();
    let mut builder = match config.method {
        HttpMethod::Get => client.get(&config.api_url),
        HttpMethod::Post => {
            let request =
                ChatRequest::new(config.model.as_str(), messages, config.extra_body.clone());
            client.post(&config.api_url).json(&request)
        }
    };
    for (name, value) in &config.headers {
        builder = builder.header(name, value);
    }

    let response = builder.send().await.map_err(|err| StreamFailure {
        status: None,
        detail: err.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StreamFailure {
            status: Some(status.as_u16()),
            detail: format!("HTTP {}: {body}", status.as_u16()),
        });
    }

    // Reassemble newline-delimited units across chunk boundaries before
    // classifying them.
    let mut buffer = String::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|err| StreamFailure {
            status: None,
            detail: err.to_string(),
        })?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buffer.find('\n') {
            let line: String = buffer.drain(..=pos).collect();
            if process_unit(stream, &line, event_tx) {
                return Ok(());
            }
        }
    }

    // A last unit may arrive without a trailing newline.
    let line = std::mem::take(&mut buffer);
    process_unit(stream, &line, event_tx);

    // Body ended without the sentinel; still a normal termination.
    Ok(())
}

/// Handles one delimited unit; returns true when the stream is done.
fn process_unit(
    stream: StreamId,
    line: &str,
    event_tx: &mpsc::Sender<(StreamId, StreamEvent)>,
) -> bool {
    match sse::classify(line) {
        SseLine::Skip => false,
        SseLine::Done => {
            desk_debug!("stream {stream} reached the done sentinel");
            true
        }
        SseLine::Payload(payload) => {
            match sse::delta_text(payload) {
                Ok(Some(text)) => {
                    let _ = event_tx.send((stream, StreamEvent::Fragment(text)));
                }
                Ok(None) => {}
                Err(err) => {
                    desk_warn!("stream {stream}: skipping malformed payload: {err}");
                }
            }
            false
        }
    }
}
