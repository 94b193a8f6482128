use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// File-backed configuration for one collection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Results page to scan for document links.
    pub target_url: String,
    /// Explicit crawl-policy file; empty means `<origin>/robots.txt`.
    pub policy_url: String,
    pub download_dir: PathBuf,
    /// Document types worth downloading.
    pub extensions: Vec<String>,
    /// Element id of the results container.
    pub container_id: String,
    /// Class carried by the result items.
    pub item_class: String,
    pub user_agent: String,
    pub accept_invalid_certs: bool,
    /// Seconds to wait between downloads, out of politeness.
    pub delay_secs: u64,
    /// Seconds to keep re-scanning an unpopulated results page.
    pub page_wait_secs: u64,
    /// Seconds before an unfinished download counts as timed out.
    pub completion_timeout_secs: u64,
    pub poll_interval_millis: u64,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            target_url: String::new(),
            policy_url: String::new(),
            download_dir: PathBuf::from("./downloads"),
            extensions: vec!["pdf".to_string(), "docx".to_string(), "xlsx".to_string()],
            container_id: "main-container".to_string(),
            item_class: "list-title".to_string(),
            user_agent: "scout/0.1".to_string(),
            accept_invalid_certs: false,
            delay_secs: 15,
            page_wait_secs: 15,
            completion_timeout_secs: 120,
            poll_interval_millis: 1000,
        }
    }
}

impl ScoutConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {path:?}"))?;
        ron::from_str(&content).with_context(|| format!("parsing configuration from {path:?}"))
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn page_wait(&self) -> Duration {
        Duration::from_secs(self.page_wait_secs)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }
}
