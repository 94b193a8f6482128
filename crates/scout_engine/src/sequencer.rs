use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use desk_logging::{desk_info, desk_warn};
use tokio::time::{sleep, timeout, Instant};
use url::Url;

use crate::fetch::{FetchSettings, FileDownloader};
use crate::filename::file_name_for;
use crate::persist::{self, PersistError};
use crate::policy::{PolicyDecision, PolicyGate};
use crate::types::{BatchReport, EngineEvent, FailureKind, LinkId, LinkOutcome, ProgressSink};

#[derive(Debug, Clone)]
pub struct SequencerSettings {
    pub download_dir: PathBuf,
    /// Pause between links, out of politeness to the site.
    pub link_delay: Duration,
    /// Pause between directory polls while waiting for a download.
    pub poll_interval: Duration,
    /// Upper bound on how long one download may take before it is
    /// abandoned as timed out.
    pub completion_timeout: Duration,
}

impl SequencerSettings {
    pub fn with_download_dir(download_dir: PathBuf) -> Self {
        Self {
            download_dir,
            link_delay: Duration::from_secs(15),
            poll_interval: Duration::from_secs(1),
            completion_timeout: Duration::from_secs(120),
        }
    }
}

enum CompletionPoll {
    Completed,
    TimedOut,
}

/// Walks an ordered link list: policy re-check, skip-if-present, detached
/// download, bounded completion poll, politeness delay. Per-link failures
/// never abort the batch; a cleanup pass removes leftover partials at the
/// end.
pub struct DownloadSequencer {
    downloader: FileDownloader,
    settings: SequencerSettings,
}

impl DownloadSequencer {
    pub fn new(fetch: FetchSettings, settings: SequencerSettings) -> Self {
        Self {
            downloader: FileDownloader::new(fetch),
            settings,
        }
    }

    pub async fn run(
        &self,
        links: &[Url],
        gate: &dyn PolicyGate,
        sink: &dyn ProgressSink,
    ) -> Result<BatchReport, PersistError> {
        let dir = &self.settings.download_dir;
        persist::ensure_download_dir(dir)?;
        // The completion poll compares against what was here before the
        // batch, so partials from earlier sessions never block it.
        let snapshot = persist::list_file_names(dir)?;

        let mut report = BatchReport::default();
        for (index, url) in links.iter().enumerate() {
            let link_id = index as LinkId + 1;
            sink.emit(EngineEvent::LinkStarted {
                link_id,
                url: url.to_string(),
            });

            let outcome = self.process_link(url, gate, &snapshot).await;
            match &outcome {
                LinkOutcome::Downloaded { file_name } => desk_info!("downloaded {file_name}"),
                LinkOutcome::AlreadyPresent { file_name } => {
                    desk_info!("already present, skipping {file_name}");
                }
                LinkOutcome::DeniedByPolicy => desk_info!("crawl policy skip for {url}"),
                LinkOutcome::TimedOut => desk_warn!("download timed out for {url}"),
                LinkOutcome::Failed(kind) => desk_warn!("download failed for {url}: {kind}"),
            }
            report.record(&outcome);
            sink.emit(EngineEvent::LinkFinished {
                link_id,
                url: url.to_string(),
                outcome,
            });

            if index + 1 < links.len() {
                sleep(self.settings.link_delay).await;
            }
        }

        let removed = persist::remove_partial_files(dir);
        if removed > 0 {
            desk_info!("cleanup removed {removed} partial download(s)");
        }
        Ok(report)
    }

    async fn process_link(
        &self,
        url: &Url,
        gate: &dyn PolicyGate,
        snapshot: &BTreeSet<String>,
    ) -> LinkOutcome {
        if let PolicyDecision::Denied(_) = gate.permits(url).await {
            return LinkOutcome::DeniedByPolicy;
        }

        let file_name = file_name_for(url);
        if self.settings.download_dir.join(&file_name).exists() {
            return LinkOutcome::AlreadyPresent { file_name };
        }

        // Detached task owns the `.part` artifact while the sequencer
        // watches the directory, like a browser-initiated download.
        let downloader = self.downloader.clone();
        let dir = self.settings.download_dir.clone();
        let task_url = url.clone();
        let task_name = file_name.clone();
        let mut handle =
            tokio::spawn(async move { downloader.download(&task_url, &dir, &task_name).await });

        let deadline = Instant::now() + self.settings.completion_timeout;
        match timeout(self.settings.completion_timeout, &mut handle).await {
            Err(_) => {
                handle.abort();
                LinkOutcome::TimedOut
            }
            Ok(Err(join_err)) => {
                desk_warn!("download task for {url} died: {join_err}");
                LinkOutcome::Failed(FailureKind::Worker)
            }
            Ok(Ok(Err(fetch_err))) => LinkOutcome::Failed(fetch_err.kind),
            Ok(Ok(Ok(_path))) => match self.wait_for_completion(snapshot, deadline).await {
                CompletionPoll::Completed => LinkOutcome::Downloaded { file_name },
                CompletionPoll::TimedOut => LinkOutcome::TimedOut,
            },
        }
    }

    /// Poll the directory until nothing new carries the partial suffix.
    async fn wait_for_completion(
        &self,
        snapshot: &BTreeSet<String>,
        deadline: Instant,
    ) -> CompletionPoll {
        loop {
            match persist::list_file_names(&self.settings.download_dir) {
                Ok(current) if persist::batch_complete(snapshot, &current) => {
                    return CompletionPoll::Completed;
                }
                Ok(_) => {}
                Err(err) => {
                    // Listing failures count against the deadline rather
                    // than failing the link outright.
                    desk_warn!("directory poll failed: {err}");
                }
            }
            if Instant::now() >= deadline {
                return CompletionPoll::TimedOut;
            }
            sleep(self.settings.poll_interval).await;
        }
    }
}
