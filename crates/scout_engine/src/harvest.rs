use std::time::Duration;

use desk_logging::{desk_debug, desk_trace, desk_warn};
use scraper::{Html, Selector};
use tokio::time::{sleep, Instant};
use url::Url;

use crate::decode::decode_page;
use crate::fetch::PageFetcher;

/// What to look for on a results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestRules {
    /// Element id of the container holding the result list.
    pub container_id: String,
    /// Class carried by the result items; the page is not considered
    /// loaded until at least one is present.
    pub item_class: String,
    /// Document types worth downloading, matched case-insensitively as
    /// substrings of the href.
    pub extensions: Vec<String>,
}

impl HarvestRules {
    pub fn matches_extension(&self, href: &str) -> bool {
        let href = href.to_ascii_lowercase();
        self.extensions
            .iter()
            .any(|ext| href.contains(&ext.to_ascii_lowercase()))
    }
}

/// Result of scanning one snapshot of the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageScan {
    /// The container or the result items have not appeared yet.
    NotReady,
    /// Hrefs of matching anchors, in document order, duplicates kept.
    Ready(Vec<String>),
}

/// Collect document links from the container element.
///
/// Anchors are returned in document order and are not de-duplicated; a
/// href appearing twice in the DOM yields two entries.
pub fn scan_page(html: &str, rules: &HarvestRules) -> PageScan {
    let document = Html::parse_document(html);

    let Ok(container_sel) = Selector::parse(&format!("#{}", rules.container_id)) else {
        return PageScan::NotReady;
    };
    let Ok(item_sel) = Selector::parse(&format!(".{}", rules.item_class)) else {
        return PageScan::NotReady;
    };
    let Ok(anchor_sel) = Selector::parse("a") else {
        return PageScan::NotReady;
    };

    let Some(container) = document.select(&container_sel).next() else {
        return PageScan::NotReady;
    };
    if document.select(&item_sel).next().is_none() {
        return PageScan::NotReady;
    }

    let mut links = Vec::new();
    for anchor in container.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        desk_trace!("anchor href={href}");
        if !href.is_empty() && rules.matches_extension(href) {
            links.push(href.to_string());
        }
    }
    PageScan::Ready(links)
}

/// Resolve a collected href against the page it came from.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(href) {
        return Some(url);
    }
    base.join(href).ok()
}

#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// How long to keep re-scanning before giving up on the page.
    pub wait_timeout: Duration,
    /// Pause between scans while the page is not ready.
    pub scan_interval: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(15),
            scan_interval: Duration::from_millis(500),
        }
    }
}

/// Re-fetches and re-scans a results page until its container and result
/// items are present, then harvests matching links.
pub struct PageWatcher {
    fetcher: PageFetcher,
    rules: HarvestRules,
    settings: WatchSettings,
}

impl PageWatcher {
    pub fn new(fetcher: PageFetcher, rules: HarvestRules, settings: WatchSettings) -> Self {
        Self {
            fetcher,
            rules,
            settings,
        }
    }

    /// Timing out, or any page-level failure persisting past the timeout,
    /// degrades to an empty harvest rather than an error.
    pub async fn harvest(&self, page_url: &Url) -> Vec<Url> {
        let deadline = Instant::now() + self.settings.wait_timeout;
        loop {
            match self.scan_once(page_url).await {
                Some((hrefs, base)) => {
                    let mut links = Vec::with_capacity(hrefs.len());
                    for href in hrefs {
                        match resolve_link(&base, &href) {
                            Some(url) => links.push(url),
                            None => desk_warn!("ignoring unresolvable href {href}"),
                        }
                    }
                    return links;
                }
                None => desk_debug!("results not present yet on {page_url}"),
            }
            if Instant::now() >= deadline {
                desk_warn!(
                    "gave up waiting for results on {page_url} after {:?}",
                    self.settings.wait_timeout
                );
                return Vec::new();
            }
            sleep(self.settings.scan_interval).await;
        }
    }

    async fn scan_once(&self, page_url: &Url) -> Option<(Vec<String>, Url)> {
        let page = match self.fetcher.fetch_page(page_url).await {
            Ok(page) => page,
            Err(err) => {
                desk_warn!("page fetch failed for {page_url}: {err}");
                return None;
            }
        };
        let decoded = match decode_page(&page.bytes, page.content_type.as_deref()) {
            Ok(decoded) => decoded,
            Err(err) => {
                desk_warn!("page decode failed for {page_url}: {err}");
                return None;
            }
        };
        desk_trace!("decoded {page_url} as {}", decoded.encoding_label);
        match scan_page(&decoded.text, &self.rules) {
            PageScan::Ready(hrefs) => {
                // Relative hrefs resolve against where the page actually
                // came from, redirects included.
                let base = Url::parse(&page.final_url).unwrap_or_else(|_| page_url.clone());
                Some((hrefs, base))
            }
            PageScan::NotReady => None,
        }
    }
}
