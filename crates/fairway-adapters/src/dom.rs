//! Structured DOM scraping of `.vevent` schedule rows.

use async_trait::async_trait;
use fairway_storage::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::session::{is_bot_challenge, BrowserSession, SessionSettings};
use crate::{AdapterError, RawEvent, Retrieval, Retriever, SourceConfig};

struct VeventSelectors {
    row: Selector,
    start_date: Selector,
    date_text: Selector,
    summary: Selector,
    course: Selector,
    address: Selector,
    registration: Selector,
    last_cell: Selector,
}

fn compile(selector: &str) -> Result<Selector, AdapterError> {
    Selector::parse(selector).map_err(|e| AdapterError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

impl VeventSelectors {
    fn compile() -> Result<Self, AdapterError> {
        Ok(Self {
            row: compile(".vevent")?,
            start_date: compile(".value-title[title]")?,
            date_text: compile(".dtstart span:first-child")?,
            summary: compile(".summary a")?,
            course: compile(".tinfo a.hoverlink.gray")?,
            address: compile(".address.gray")?,
            registration: compile("[data-regend]")?,
            last_cell: compile("td:last-child")?,
        })
    }
}

fn text_or_none(value: String) -> Option<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

fn first_text(row: ElementRef<'_>, selector: &Selector) -> Option<String> {
    row.select(selector)
        .next()
        .and_then(|n| text_or_none(n.text().collect::<String>()))
}

fn first_attr(row: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    row.select(selector)
        .next()
        .and_then(|n| n.value().attr(attr))
        .and_then(|s| text_or_none(s.to_string()))
}

fn absolute_url(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

/// Extract every `.vevent` row of a schedule page.
pub fn extract_vevents(html: &str, page_url: &str) -> Result<Vec<RawEvent>, AdapterError> {
    let selectors = VeventSelectors::compile()?;
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let events = document
        .select(&selectors.row)
        .map(|row| RawEvent {
            name: first_text(row, &selectors.summary).unwrap_or_default(),
            start_date: first_attr(row, &selectors.start_date, "title"),
            end_date: None,
            date_text: first_text(row, &selectors.date_text),
            course_name: first_text(row, &selectors.course),
            location: first_text(row, &selectors.address),
            registration_deadline: first_attr(row, &selectors.registration, "data-regend"),
            fee_text: first_attr(row, &selectors.registration, "data-regfee"),
            status_marker: first_text(row, &selectors.last_cell),
            event_url: first_attr(row, &selectors.summary, "href").map(|href| absolute_url(base.as_ref(), &href)),
        })
        .collect();
    Ok(events)
}

/// Loads the schedule page like a browser would and reads its rows.
#[derive(Debug, Clone)]
pub struct DomRetriever {
    settings: SessionSettings,
}

impl DomRetriever {
    pub fn new(settings: SessionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Retriever for DomRetriever {
    async fn fetch_raw_events(&self, source: &SourceConfig) -> Result<Retrieval, AdapterError> {
        let mut session = BrowserSession::open(&source.source_id, self.settings)?;
        let page = session.navigate(&source.url).await?;

        if is_bot_challenge(&page.title) {
            return Ok(Retrieval::Challenged { title: page.title });
        }
        debug!(title = %page.title, "page loaded");

        let events = extract_vevents(&page.html, &page.url)?;
        Ok(Retrieval::Events(events))
    }
}
