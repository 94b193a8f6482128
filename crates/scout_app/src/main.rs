mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::Utc;
use desk_logging::{desk_info, LogDestination};
use scout_engine::{
    EngineConfig, EngineEvent, EngineHandle, FetchSettings, HarvestRules, LinkOutcome,
    SequencerSettings, WatchSettings,
};
use url::Url;

use crate::config::ScoutConfig;

fn main() -> anyhow::Result<()> {
    desk_logging::initialize(LogDestination::Both(Path::new("./scout.log")));

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./scout.ron"));
    let config = ScoutConfig::load(&config_path)?;

    if config.target_url.is_empty() {
        bail!("target_url is not set in {config_path:?}");
    }
    let target_url = Url::parse(&config.target_url)
        .with_context(|| format!("invalid target_url {}", config.target_url))?;
    let policy_url = if config.policy_url.is_empty() {
        None
    } else {
        Some(
            Url::parse(&config.policy_url)
                .with_context(|| format!("invalid policy_url {}", config.policy_url))?,
        )
    };

    let engine_config = EngineConfig {
        fetch: FetchSettings {
            user_agent: config.user_agent.clone(),
            accept_invalid_certs: config.accept_invalid_certs,
            ..FetchSettings::default()
        },
        rules: HarvestRules {
            container_id: config.container_id.clone(),
            item_class: config.item_class.clone(),
            extensions: config.extensions.clone(),
        },
        watch: WatchSettings {
            wait_timeout: config.page_wait(),
            ..WatchSettings::default()
        },
        sequencer: SequencerSettings {
            download_dir: config.download_dir.clone(),
            link_delay: config.delay(),
            poll_interval: config.poll_interval(),
            completion_timeout: config.completion_timeout(),
        },
        policy_url,
    };

    let started = Utc::now();
    desk_info!("collection started at {}", started.to_rfc3339());

    let engine = EngineHandle::new(engine_config);
    engine.collect(target_url);

    while let Some(event) = engine.recv() {
        match event {
            EngineEvent::PageScanned { link_count } => {
                println!("found {link_count} candidate document(s)");
            }
            EngineEvent::LinkStarted { link_id, url } => {
                println!("[{link_id}] fetching {url}");
            }
            EngineEvent::LinkFinished { link_id, outcome, .. } => match outcome {
                LinkOutcome::Downloaded { file_name } => {
                    println!("[{link_id}] saved {file_name}");
                }
                LinkOutcome::AlreadyPresent { file_name } => {
                    println!("[{link_id}] already have {file_name}, skipped");
                }
                LinkOutcome::DeniedByPolicy => {
                    println!("[{link_id}] crawl policy denied, skipped");
                }
                LinkOutcome::TimedOut => {
                    println!("[{link_id}] gave up waiting for the download");
                }
                LinkOutcome::Failed(kind) => {
                    println!("[{link_id}] failed: {kind}");
                }
            },
            EngineEvent::BatchFinished { report } => {
                let finished = Utc::now();
                println!(
                    "done at {}: {} downloaded, {} already present, {} denied, {} timed out, {} failed",
                    finished.to_rfc3339(),
                    report.downloaded,
                    report.already_present,
                    report.denied,
                    report.timed_out,
                    report.failed,
                );
                return Ok(());
            }
            EngineEvent::BatchFailed { message } => {
                bail!("collection failed: {message}");
            }
        }
    }

    bail!("engine stopped before finishing the batch");
}
