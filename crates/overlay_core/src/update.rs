use desk_logging::desk_warn;

use crate::{ChatState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: ChatState, msg: Msg) -> (ChatState, Vec<Effect>) {
    let effects = match msg {
        Msg::DraftChanged(text) => {
            state.set_draft(text);
            Vec::new()
        }
        Msg::DraftSubmitted => {
            let text = state.draft().trim().to_string();
            if text.is_empty() {
                return (state, Vec::new());
            }
            if state.is_streaming() {
                // One reply at a time; a submission mid-stream is refused
                // rather than queued.
                desk_warn!("ignoring submission while a reply is still streaming");
                return (state, Vec::new());
            }
            state.clear_draft();
            state.push_user(text);
            let stream = state.begin_stream();
            let history = state.history().to_vec();
            vec![Effect::StartStream { stream, history }]
        }
        Msg::StreamFragment { stream, text } => {
            state.accept_fragment(stream, text);
            Vec::new()
        }
        Msg::StreamFailed { stream, detail } => {
            state.fail_stream(stream, detail);
            Vec::new()
        }
        Msg::StreamFinished { stream } => {
            state.finish_stream(stream);
            Vec::new()
        }
        Msg::ClearRequested => {
            state.clear();
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
