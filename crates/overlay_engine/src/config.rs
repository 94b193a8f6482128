use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
}

/// Immutable configuration for the chat client. Never mutated in place;
/// `ConfigHandle::replace` swaps the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub api_url: String,
    pub method: HttpMethod,
    /// Header name/value pairs sent with every call.
    pub headers: Vec<(String, String)>,
    pub model: String,
    /// Extra body fields merged into the request verbatim.
    pub extra_body: serde_json::Map<String, serde_json::Value>,
    /// System-wide key combination that raises the input; registered by
    /// the embedding shell, replaced wholesale on every settings reload.
    pub hotkey: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/v1/chat/completions".to_string(),
            method: HttpMethod::Post,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            model: "qwen3-235b".to_string(),
            extra_body: serde_json::Map::new(),
            hotkey: "ctrl+alt+a".to_string(),
        }
    }
}

/// Shares one `ChatConfig` between the shell and in-flight calls.
///
/// `snapshot` hands out the current value; calls keep using the snapshot
/// they started with even if the config is replaced mid-stream.
pub struct ConfigHandle {
    inner: Mutex<Arc<ChatConfig>>,
}

impl ConfigHandle {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            inner: Mutex::new(Arc::new(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<ChatConfig> {
        self.inner.lock().expect("config lock").clone()
    }

    /// Atomically installs `config`, returning the value it replaced.
    pub fn replace(&self, config: ChatConfig) -> Arc<ChatConfig> {
        let mut guard = self.inner.lock().expect("config lock");
        std::mem::replace(&mut *guard, Arc::new(config))
    }
}
