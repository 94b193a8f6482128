//! Overlay engine: streaming chat-completions client behind a channel
//! handle, plus the immutable configuration it runs with.
mod config;
mod sse;
mod stream;
mod types;

pub use config::{ChatConfig, ConfigHandle, HttpMethod};
pub use sse::{classify, delta_text, SseLine, DONE_SENTINEL};
pub use stream::ChatHandle;
pub use types::{
    ChatMessage, ChatRequest, Role, StreamChoice, StreamDelta, StreamEvent, StreamId,
    StreamResponse,
};
