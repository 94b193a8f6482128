use std::sync::{mpsc, Arc};
use std::thread;

use overlay_core::{ChatEntry, Effect, Msg};
use overlay_engine::{ChatHandle, ChatMessage, ConfigHandle, StreamEvent};

/// Executes core effects against the streaming engine and pumps engine
/// events back into the message queue.
pub struct EffectRunner {
    chat: Arc<ChatHandle>,
    config: Arc<ConfigHandle>,
}

impl EffectRunner {
    pub fn new(config: Arc<ConfigHandle>, msg_tx: mpsc::Sender<Msg>) -> Self {
        let chat = Arc::new(ChatHandle::new());
        let runner = Self {
            chat: chat.clone(),
            config,
        };

        thread::spawn(move || {
            while let Some((stream, event)) = chat.recv() {
                let msg = match event {
                    StreamEvent::Fragment(text) => Msg::StreamFragment { stream, text },
                    StreamEvent::Failed { detail, .. } => Msg::StreamFailed { stream, detail },
                    StreamEvent::Finished => Msg::StreamFinished { stream },
                };
                if msg_tx.send(msg).is_err() {
                    break;
                }
            }
        });

        runner
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartStream { stream, history } => {
                    // Each call runs against the config snapshot taken now;
                    // a mid-stream settings reload does not affect it.
                    let messages = history.into_iter().map(to_wire_message).collect();
                    self.chat.start(stream, self.config.snapshot(), messages);
                }
            }
        }
    }
}

fn to_wire_message(entry: ChatEntry) -> ChatMessage {
    ChatMessage {
        role: map_role(entry.role),
        content: entry.text,
    }
}

fn map_role(role: overlay_core::Role) -> overlay_engine::Role {
    match role {
        overlay_core::Role::User => overlay_engine::Role::User,
        overlay_core::Role::Assistant => overlay_engine::Role::Assistant,
    }
}
