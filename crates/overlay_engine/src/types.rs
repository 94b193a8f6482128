use serde::{Deserialize, Serialize};

pub type StreamId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Wire body for a completions call. The streaming flag is forced true by
/// construction; caller-supplied extra fields ride along flattened.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatRequest {
    pub fn new(
        model: impl Into<String>,
        messages: Vec<ChatMessage>,
        extra: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            extra,
        }
    }
}

// Shape of one streamed payload unit; everything beyond the incremental
// text is ignored.
#[derive(Debug, Deserialize)]
pub struct StreamResponse {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamDelta {
    pub content: Option<String>,
}

/// What the streaming worker delivers, in order, per stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// One incremental piece of assistant text.
    Fragment(String),
    /// The call failed; at most one per stream, before `Finished`.
    Failed {
        status: Option<u16>,
        detail: String,
    },
    /// Terminal notification; exactly one per stream, on every path.
    Finished,
}
