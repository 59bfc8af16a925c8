//! Browser-like page session used by both retrieval shapes.

use std::time::Duration;

use fairway_storage::{ClientIdentity, FetchedResponse, HttpClientConfig, HttpFetcher};
use scraper::{Html, Selector};
use tracing::debug;

use crate::AdapterError;

const CHALLENGE_MARKERS: [&str; 2] = ["verification", "human"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub timeout: Duration,
    /// Pause after the page is idle and before its content is read.
    pub grace_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub url: String,
    pub title: String,
    pub html: String,
}

pub fn is_bot_challenge(title: &str) -> bool {
    let lower = title.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| lower.contains(marker))
}

pub fn page_title(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|n| n.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// A single client identity held for one adapter run.
///
/// The session is closed when dropped, so every exit path of a retriever
/// releases it.
#[derive(Debug)]
pub struct BrowserSession {
    source_id: String,
    fetcher: HttpFetcher,
    grace_delay: Duration,
    requests: usize,
}

impl BrowserSession {
    pub fn open(source_id: &str, settings: SessionSettings) -> Result<Self, AdapterError> {
        let fetcher = HttpFetcher::new(HttpClientConfig {
            timeout: settings.timeout,
            identity: ClientIdentity::random(),
        })?;
        debug!(source_id, user_agent = %fetcher.identity().user_agent, "browser session opened");
        Ok(Self {
            source_id: source_id.to_string(),
            fetcher,
            grace_delay: settings.grace_delay,
            requests: 0,
        })
    }

    pub fn identity(&self) -> &ClientIdentity {
        self.fetcher.identity()
    }

    /// Load a document. The page counts as network-idle once its body has
    /// been read completely; the grace delay runs before it is returned.
    pub async fn navigate(&mut self, url: &str) -> Result<LoadedPage, AdapterError> {
        let resp = self.fetch_resource(url).await?;
        self.settle().await;
        let html = resp.text();
        let title = page_title(&html);
        Ok(LoadedPage {
            url: resp.final_url,
            title,
            html,
        })
    }

    pub async fn fetch_resource(&mut self, url: &str) -> Result<FetchedResponse, AdapterError> {
        self.requests += 1;
        Ok(self.fetcher.fetch_bytes(&self.source_id, url).await?)
    }

    async fn settle(&self) {
        if !self.grace_delay.is_zero() {
            tokio::time::sleep(self.grace_delay).await;
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        debug!(source_id = %self.source_id, requests = self.requests, "browser session closed");
    }
}
