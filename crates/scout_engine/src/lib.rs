//! Scout engine: crawl-policy checks, page scanning, and download
//! sequencing behind a channel-based handle.
mod engine;
mod decode;
mod harvest;
mod fetch;
mod filename;
mod persist;
mod policy;
mod sequencer;
mod types;

pub use decode::{decode_page, DecodeError, DecodedPage};
pub use engine::{EngineConfig, EngineHandle};
pub use fetch::{FetchSettings, FileDownloader, PageBytes, PageFetcher};
pub use filename::file_name_for;
pub use harvest::{resolve_link, scan_page, HarvestRules, PageScan, PageWatcher, WatchSettings};
pub use persist::{
    batch_complete, ensure_download_dir, list_file_names, remove_partial_files, PersistError,
    PART_SUFFIX,
};
pub use policy::{
    DenyReason, HttpPolicyGate, PolicyDecision, PolicyGate, RobotsRules, POLICY_FILE_PATH,
};
pub use sequencer::{DownloadSequencer, SequencerSettings};
pub use types::{
    BatchReport, ChannelProgressSink, EngineEvent, FailureKind, FetchError, LinkId, LinkOutcome,
    ProgressSink,
};
