use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::persist::PART_SUFFIX;
use crate::types::{FailureKind, FetchError};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub page_content_types: Vec<String>,
    pub user_agent: String,
    pub accept_invalid_certs: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 50 * 1024 * 1024,
            page_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            user_agent: "scout/0.1".to_string(),
            accept_invalid_certs: false,
        }
    }
}

impl FetchSettings {
    fn is_page_content_type(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.page_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }
}

/// Fetched page HTML, still undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBytes {
    pub bytes: Vec<u8>,
    pub final_url: String,
    pub content_type: Option<String>,
}

fn build_client(
    settings: &FetchSettings,
    bounded_request: bool,
) -> Result<reqwest::Client, FetchError> {
    let redirect_limit = settings.redirect_limit;
    let policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= redirect_limit {
            attempt.error("redirect limit exceeded")
        } else {
            attempt.follow()
        }
    });

    let mut builder = reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .redirect(policy)
        .user_agent(settings.user_agent.clone())
        .danger_accept_invalid_certs(settings.accept_invalid_certs);
    // Document downloads are bounded by the sequencer's completion timeout,
    // not a per-request deadline.
    if bounded_request {
        builder = builder.timeout(settings.request_timeout);
    }
    builder
        .build()
        .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
}

/// Fetches result pages into memory so they can be scanned for links.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    settings: FetchSettings,
}

impl PageFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    pub async fn fetch_page(&self, url: &Url) -> Result<PageBytes, FetchError> {
        let client = build_client(&self.settings, true)?;

        let response = client
            .get(url.as_str())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.settings.is_page_content_type(ct) {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(PageBytes {
            bytes,
            final_url,
            content_type,
        })
    }
}

/// Streams a document to `<dir>/<name>.part`, renaming to `<name>` once the
/// body is fully written. The `.part` artifact is what the sequencer's
/// completion poll watches for.
#[derive(Debug, Clone)]
pub struct FileDownloader {
    settings: FetchSettings,
}

impl FileDownloader {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    pub async fn download(
        &self,
        url: &Url,
        dir: &Path,
        file_name: &str,
    ) -> Result<PathBuf, FetchError> {
        let client = build_client(&self.settings, false)?;

        let response = client
            .get(url.as_str())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let part_path = dir.join(format!("{file_name}{PART_SUFFIX}"));
        let final_path = dir.join(file_name);

        let mut file = fs::File::create(&part_path)
            .map_err(|err| FetchError::new(FailureKind::Io, err.to_string()))?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            // A failed transfer leaves the `.part` file behind for the
            // cleanup pass, same as an interrupted browser download.
            let chunk = chunk.map_err(map_reqwest_error)?;
            written += chunk.len() as u64;
            if written > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(written),
                    },
                    "response too large",
                ));
            }
            file.write_all(&chunk)
                .map_err(|err| FetchError::new(FailureKind::Io, err.to_string()))?;
        }
        file.sync_all()
            .map_err(|err| FetchError::new(FailureKind::Io, err.to_string()))?;
        drop(file);

        fs::rename(&part_path, &final_path)
            .map_err(|err| FetchError::new(FailureKind::Io, err.to_string()))?;
        Ok(final_path)
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
