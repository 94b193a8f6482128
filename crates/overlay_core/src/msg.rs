#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User edited the input line.
    DraftChanged(String),
    /// User submitted the current draft as a chat message.
    DraftSubmitted,
    /// Incremental text from the streaming worker.
    StreamFragment {
        stream: crate::StreamId,
        text: String,
    },
    /// The streaming worker reported a failure.
    StreamFailed {
        stream: crate::StreamId,
        detail: String,
    },
    /// The streaming worker reached a terminal condition.
    StreamFinished { stream: crate::StreamId },
    /// User asked to wipe the conversation.
    ClearRequested,
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
