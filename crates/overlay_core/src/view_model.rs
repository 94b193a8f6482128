use crate::Role;

/// One visible message unit: a finished entry or the open streaming bubble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BubbleView {
    pub role: Role,
    pub text: String,
    pub streaming: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationView {
    pub bubbles: Vec<BubbleView>,
    pub draft: String,
    pub busy: bool,
}
