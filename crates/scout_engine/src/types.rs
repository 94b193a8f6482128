use std::fmt;
use std::sync::mpsc;

pub type LinkId = u64;

/// Events reported by the engine while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    PageScanned {
        link_count: usize,
    },
    LinkStarted {
        link_id: LinkId,
        url: String,
    },
    LinkFinished {
        link_id: LinkId,
        url: String,
        outcome: LinkOutcome,
    },
    BatchFinished {
        report: BatchReport,
    },
    BatchFailed {
        message: String,
    },
}

/// Terminal state of a single link in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Downloaded { file_name: String },
    AlreadyPresent { file_name: String },
    DeniedByPolicy,
    TimedOut,
    Failed(FailureKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub downloaded: usize,
    pub already_present: usize,
    pub denied: usize,
    pub timed_out: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn record(&mut self, outcome: &LinkOutcome) {
        match outcome {
            LinkOutcome::Downloaded { .. } => self.downloaded += 1,
            LinkOutcome::AlreadyPresent { .. } => self.already_present += 1,
            LinkOutcome::DeniedByPolicy => self.denied += 1,
            LinkOutcome::TimedOut => self.timed_out += 1,
            LinkOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.downloaded + self.already_present + self.denied + self.timed_out + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Io,
    Network,
    Worker,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Io => write!(f, "io error"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Worker => write!(f, "download task aborted"),
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}
