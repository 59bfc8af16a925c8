//! Schedule retrieval by picking the page's structured data feed out of the
//! requests it makes while loading.

use std::sync::OnceLock;

use async_trait::async_trait;
use fairway_storage::Url;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;

use crate::session::{is_bot_challenge, BrowserSession, SessionSettings};
use crate::{AdapterError, RawEvent, Retrieval, Retriever, SourceConfig};

const URL_ATTRIBUTES: [&str; 2] = ["src", "href"];

fn script_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"["'](https?://[^"'\s]+|/[^"'\s]+)["']"#).expect("valid script url regex"))
}

#[derive(Debug, Deserialize)]
struct FeedPayload {
    #[serde(default)]
    items: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedItem {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    course_name: Option<String>,
    #[serde(default)]
    course_location: Option<String>,
    #[serde(default)]
    event_url: Option<String>,
}

impl From<FeedItem> for RawEvent {
    fn from(item: FeedItem) -> Self {
        RawEvent {
            name: item.name.unwrap_or_default(),
            start_date: item.start_date,
            end_date: item.end_date,
            course_name: item.course_name,
            location: item.course_location,
            event_url: item.event_url,
            ..RawEvent::default()
        }
    }
}

/// Decode a feed body into raw events. A payload without `items` has none.
pub fn events_from_feed(body: &[u8], url: &str) -> Result<Vec<RawEvent>, AdapterError> {
    let payload: FeedPayload = serde_json::from_slice(body).map_err(|source| AdapterError::FeedPayload {
        url: url.to_string(),
        source,
    })?;
    Ok(payload.items.into_iter().map(RawEvent::from).collect())
}

/// Absolute URLs of every resource a loaded page would request: linked
/// assets, anchors, `data-*` endpoints and quoted paths in inline scripts.
pub fn discover_resource_urls(html: &str, page_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let mut found = Vec::new();

    let mut push = |candidate: &str| {
        let candidate = candidate.trim();
        if candidate.is_empty() || candidate.starts_with('#') {
            return;
        }
        let resolved = match &base {
            Some(base) => base.join(candidate).map(|u| u.to_string()).ok(),
            None => Url::parse(candidate).map(|u| u.to_string()).ok(),
        };
        if let Some(url) = resolved {
            if !found.contains(&url) {
                found.push(url);
            }
        }
    };

    for element in document.root_element().descendants().filter_map(scraper::ElementRef::wrap) {
        for (name, value) in element.value().attrs() {
            if URL_ATTRIBUTES.contains(&name) || (name.starts_with("data-") && value.contains('/')) {
                push(value);
            }
        }
    }

    if let Ok(scripts) = Selector::parse("script:not([src])") {
        for script in document.select(&scripts) {
            let body = script.text().collect::<String>();
            for caps in script_url_re().captures_iter(&body) {
                push(&caps[1]);
            }
        }
    }

    found
}

fn select_feed_url(source: &SourceConfig, page_url: &str, html: &str) -> Result<String, AdapterError> {
    if let Some(feed_url) = source.feed_url.as_deref() {
        return Url::parse(page_url)
            .and_then(|base| base.join(feed_url))
            .map(|u| u.to_string())
            .map_err(|e| AdapterError::Message(format!("invalid feed url {feed_url}: {e}")));
    }

    let pattern = source.feed_match.clone().unwrap_or_default();
    if pattern.is_empty() {
        return Err(AdapterError::FeedNotFound {
            pattern,
            url: page_url.to_string(),
        });
    }
    discover_resource_urls(html, page_url)
        .into_iter()
        .find(|url| url.contains(&pattern))
        .ok_or_else(|| AdapterError::FeedNotFound {
            pattern,
            url: page_url.to_string(),
        })
}

/// Loads the landing page, then fetches the feed it calls within the same
/// session.
#[derive(Debug, Clone)]
pub struct FeedInterceptRetriever {
    settings: SessionSettings,
}

impl FeedInterceptRetriever {
    pub fn new(settings: SessionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Retriever for FeedInterceptRetriever {
    async fn fetch_raw_events(&self, source: &SourceConfig) -> Result<Retrieval, AdapterError> {
        let mut session = BrowserSession::open(&source.source_id, self.settings)?;
        let page = session.navigate(&source.url).await?;

        if is_bot_challenge(&page.title) {
            return Ok(Retrieval::Challenged { title: page.title });
        }

        let feed_url = select_feed_url(source, &page.url, &page.html)?;
        debug!(%feed_url, "intercepted schedule feed");
        let response = session.fetch_resource(&feed_url).await?;

        let events = events_from_feed(&response.body, &response.final_url)?;
        Ok(Retrieval::Events(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::usga_config;

    const PAGE: &str = include_str!("../../../fixtures/usga/championships.html");
    const FEED: &str = include_str!("../../../fixtures/usga/usga-events.json");
    const PAGE_URL: &str = "https://www.usga.org/championships";

    #[test]
    fn discovers_assets_links_and_script_endpoints() {
        let urls = discover_resource_urls(PAGE, PAGE_URL);
        assert!(urls.contains(&"https://www.usga.org/etc/designs/usga/site.css".to_string()));
        assert!(urls.contains(&"https://www.usga.org/etc/designs/usga/app.js".to_string()));
        assert!(urls.contains(&"https://www.usga.org/championships/junior-amateur.html".to_string()));
        assert!(urls.contains(&"https://www.usga.org/api/usga-events?season=2026".to_string()));
    }

    #[test]
    fn feed_is_selected_by_substring() {
        let url = select_feed_url(&usga_config(), PAGE_URL, PAGE).unwrap();
        assert_eq!(url, "https://www.usga.org/api/usga-events?season=2026");
    }

    #[test]
    fn explicit_feed_url_wins() {
        let mut config = usga_config();
        config.feed_url = Some("/api/other-feed".into());
        let url = select_feed_url(&config, PAGE_URL, PAGE).unwrap();
        assert_eq!(url, "https://www.usga.org/api/other-feed");
    }

    #[test]
    fn missing_feed_is_an_error() {
        let mut config = usga_config();
        config.feed_match = Some("does-not-exist".into());
        let err = select_feed_url(&config, PAGE_URL, PAGE).unwrap_err();
        assert!(matches!(err, AdapterError::FeedNotFound { .. }));
    }

    #[test]
    fn decodes_feed_items() {
        let events = events_from_feed(FEED.as_bytes(), "https://www.usga.org/api/usga-events").unwrap();
        assert_eq!(events.len(), 8);
        assert_eq!(events[0].name, "U.S. Junior Amateur");
        assert_eq!(events[0].start_date.as_deref(), Some("Mon Jul 20 01:00:00 EDT 2026"));
        assert_eq!(events[0].location.as_deref(), Some("Oakmont, Pa."));
        assert_eq!(events[3].course_name, None);
        assert_eq!(events[6].name, "");
    }

    #[test]
    fn payload_without_items_is_empty_and_garbage_is_an_error() {
        assert!(events_from_feed(br#"{"total":0}"#, "u").unwrap().is_empty());
        let err = events_from_feed(b"<html>", "u").unwrap_err();
        assert!(matches!(err, AdapterError::FeedPayload { .. }));
    }
}
