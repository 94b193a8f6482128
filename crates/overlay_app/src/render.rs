use std::io::{self, Write};

use overlay_core::{ConversationView, Role};

/// Writes conversation changes to the terminal incrementally: streamed
/// fragments extend the current line, finished entries get their own.
pub struct Renderer {
    printed_entries: usize,
    open_text: String,
    line_open: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            printed_entries: 0,
            open_text: String::new(),
            line_open: false,
        }
    }

    pub fn apply(&mut self, view: &ConversationView) {
        let mut out = io::stdout();
        let completed: Vec<_> = view.bubbles.iter().filter(|b| !b.streaming).collect();
        let open = view.bubbles.iter().find(|b| b.streaming);

        if completed.len() < self.printed_entries {
            // History shrank: the conversation was cleared.
            if self.line_open {
                let _ = writeln!(out);
            }
            let _ = writeln!(out, "-- conversation cleared --");
            self.printed_entries = 0;
            self.open_text.clear();
            self.line_open = false;
        }

        for bubble in completed.iter().skip(self.printed_entries) {
            let frozen_open_bubble = self.line_open
                && open.is_none()
                && bubble.role == Role::Assistant
                && bubble.text.starts_with(&self.open_text);
            if frozen_open_bubble {
                // The streamed line became this entry; just close it.
                let _ = write!(out, "{}", &bubble.text[self.open_text.len()..]);
                let _ = writeln!(out);
                self.line_open = false;
                self.open_text.clear();
            } else {
                if self.line_open {
                    let _ = writeln!(out);
                    self.line_open = false;
                    self.open_text.clear();
                }
                let _ = writeln!(out, "{} {}", prompt(bubble.role), bubble.text);
            }
        }
        self.printed_entries = completed.len();

        if let Some(bubble) = open {
            if !self.line_open {
                let _ = write!(out, "{} ", prompt(Role::Assistant));
                self.line_open = true;
                self.open_text.clear();
            }
            if bubble.text.starts_with(&self.open_text) {
                let _ = write!(out, "{}", &bubble.text[self.open_text.len()..]);
            }
            self.open_text = bubble.text.clone();
        } else if self.line_open {
            let _ = writeln!(out);
            self.line_open = false;
            self.open_text.clear();
        }

        let _ = out.flush();
    }
}

fn prompt(role: Role) -> &'static str {
    match role {
        Role::User => "you>",
        Role::Assistant => "ai>",
    }
}
