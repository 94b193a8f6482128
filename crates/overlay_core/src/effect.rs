use crate::{ChatEntry, StreamId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a streaming completion call carrying the whole history.
    StartStream {
        stream: StreamId,
        history: Vec<ChatEntry>,
    },
}
