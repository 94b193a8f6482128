use desk_logging::desk_debug;

use crate::view_model::{BubbleView, ConversationView};

pub type StreamId = u64;

/// Author of a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One finished message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub role: Role,
    pub text: String,
}

/// The single open assistant bubble being filled by a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenBubble {
    stream: StreamId,
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatState {
    draft: String,
    history: Vec<ChatEntry>,
    bubble: Option<OpenBubble>,
    active_stream: Option<StreamId>,
    next_stream: StreamId,
    dirty: bool,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> ConversationView {
        let mut bubbles: Vec<BubbleView> = self
            .history
            .iter()
            .map(|entry| BubbleView {
                role: entry.role,
                text: entry.text.clone(),
                streaming: false,
            })
            .collect();
        if let Some(bubble) = &self.bubble {
            bubbles.push(BubbleView {
                role: Role::Assistant,
                text: bubble.text.clone(),
                streaming: true,
            });
        }
        ConversationView {
            bubbles,
            draft: self.draft.clone(),
            busy: self.active_stream.is_some(),
        }
    }

    pub fn history(&self) -> &[ChatEntry] {
        &self.history
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_streaming(&self) -> bool {
        self.active_stream.is_some()
    }

    /// Returns whether the state changed since the last call, resetting
    /// the flag.
    pub fn consume_dirty(&mut self) -> bool {
        let was = self.dirty;
        self.dirty = false;
        was
    }

    pub(crate) fn set_draft(&mut self, text: String) {
        if self.draft != text {
            self.draft = text;
            self.dirty = true;
        }
    }

    pub(crate) fn clear_draft(&mut self) {
        if !self.draft.is_empty() {
            self.draft.clear();
            self.dirty = true;
        }
    }

    pub(crate) fn push_user(&mut self, text: String) {
        self.history.push(ChatEntry {
            role: Role::User,
            text,
        });
        self.dirty = true;
    }

    pub(crate) fn push_assistant(&mut self, text: String) {
        self.history.push(ChatEntry {
            role: Role::Assistant,
            text,
        });
        self.dirty = true;
    }

    /// Allocates the next stream id and marks it active.
    pub(crate) fn begin_stream(&mut self) -> StreamId {
        self.next_stream += 1;
        self.active_stream = Some(self.next_stream);
        self.dirty = true;
        self.next_stream
    }

    /// Applies one fragment. Opens the bubble on the first fragment of the
    /// active stream; fragments from any other stream are dropped.
    pub(crate) fn accept_fragment(&mut self, stream: StreamId, text: String) {
        if self.active_stream != Some(stream) {
            desk_debug!("dropping fragment from stale stream {stream}");
            return;
        }
        match self.bubble.as_mut() {
            Some(bubble) => bubble.text.push_str(&text),
            None => self.bubble = Some(OpenBubble { stream, text }),
        }
        self.dirty = true;
    }

    /// Appends a synthetic assistant message describing the failure.
    pub(crate) fn fail_stream(&mut self, stream: StreamId, detail: String) {
        if self.active_stream != Some(stream) {
            desk_debug!("dropping error from stale stream {stream}");
            return;
        }
        self.push_assistant(format!("Error: {detail}"));
    }

    /// Freezes the open bubble into the history and closes the stream.
    pub(crate) fn finish_stream(&mut self, stream: StreamId) {
        if self.active_stream != Some(stream) {
            desk_debug!("dropping finish from stale stream {stream}");
            return;
        }
        if let Some(bubble) = self.bubble.take() {
            self.push_assistant(bubble.text);
        }
        self.active_stream = None;
        self.dirty = true;
    }

    /// Empties the history and removes every bubble, open one included.
    /// A stream still running keeps going, but its events no longer match
    /// the active id and are discarded.
    pub(crate) fn clear(&mut self) {
        self.history.clear();
        self.bubble = None;
        self.active_stream = None;
        self.dirty = true;
    }
}
