//! Source adapter contracts, retrievers, and the per-site adapters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fairway_core::Tournament;
use fairway_storage::FetchError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub mod bluegolf;
pub mod dom;
pub mod feed;
pub mod session;
pub mod usga;

pub use bluegolf::BlueGolfAdapter;
pub use dom::DomRetriever;
pub use feed::FeedInterceptRetriever;
pub use session::{is_bot_challenge, BrowserSession, LoadedPage, SessionSettings};
pub use usga::UsgaAdapter;

pub const CRATE_NAME: &str = "fairway-adapters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    BlueGolf,
    Usga,
}

/// How an adapter's raw content is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalShape {
    Dom,
    FeedIntercept,
}

fn default_enabled() -> bool {
    true
}

/// One upstream schedule as configured in `sources.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Lowercase id; also the prefix of generated tournament ids.
    pub source_id: String,
    pub display_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub kind: AdapterKind,
    pub url: String,
    /// Snapshot file name under the data directory.
    pub output: String,
    #[serde(default)]
    pub default_state: String,
    #[serde(default)]
    pub season_year: Option<i32>,
    /// Substring identifying the schedule feed among the page's requests.
    #[serde(default)]
    pub feed_match: Option<String>,
    #[serde(default)]
    pub feed_url: Option<String>,
}

/// Retrieval-agnostic per-event field bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub name: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub date_text: Option<String>,
    pub course_name: Option<String>,
    pub location: Option<String>,
    pub registration_deadline: Option<String>,
    pub fee_text: Option<String>,
    pub status_marker: Option<String>,
    pub event_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    Events(Vec<RawEvent>),
    /// The site served a bot challenge instead of content.
    Challenged { title: String },
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("no request matching `{pattern}` while loading {url}")]
    FeedNotFound { pattern: String, url: String },
    #[error("invalid feed payload from {url}: {source}")]
    FeedPayload {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AdapterError {
    /// The page or feed did not answer within the session timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Fetch(err) if err.is_timeout())
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn fetch_raw_events(&self, source: &SourceConfig) -> Result<Retrieval, AdapterError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterContext {
    pub run_id: Uuid,
    pub now: DateTime<Utc>,
}

impl AdapterContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterOutput {
    pub tournaments: Vec<Tournament>,
    pub raw_events: usize,
    /// Records without a name or a parseable date.
    pub dropped: usize,
    /// Records rejected by the source's relevance filter.
    pub filtered: usize,
    pub challenged: bool,
}

impl AdapterOutput {
    pub fn challenged() -> Self {
        Self {
            challenged: true,
            ..Self::default()
        }
    }
}

/// Sequential `{prefix}-{n}` ids for one adapter run.
#[derive(Debug)]
pub(crate) struct IdSequence<'a> {
    prefix: &'a str,
    next: usize,
}

impl<'a> IdSequence<'a> {
    pub(crate) fn new(prefix: &'a str) -> Self {
        Self { prefix, next: 0 }
    }

    pub(crate) fn next_id(&mut self) -> String {
        let id = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn config(&self) -> &SourceConfig;

    fn retrieval_shape(&self) -> RetrievalShape;

    /// Map raw bundles onto tournaments. Pure; `ctx.now` is the only clock.
    fn normalize(&self, raw: Vec<RawEvent>, ctx: &AdapterContext) -> AdapterOutput;

    fn source_id(&self) -> &str {
        &self.config().source_id
    }

    async fn collect(&self, retriever: &dyn Retriever, ctx: &AdapterContext) -> Result<AdapterOutput, AdapterError> {
        let span = info_span!("collect", run_id = %ctx.run_id, source_id = self.source_id());
        async {
            match retriever.fetch_raw_events(self.config()).await? {
                Retrieval::Challenged { title } => {
                    warn!(%title, "bot verification page served; returning no tournaments");
                    Ok(AdapterOutput::challenged())
                }
                Retrieval::Events(events) => {
                    let output = self.normalize(events, ctx);
                    info!(
                        raw = output.raw_events,
                        kept = output.tournaments.len(),
                        dropped = output.dropped,
                        filtered = output.filtered,
                        "normalized events"
                    );
                    Ok(output)
                }
            }
        }
        .instrument(span)
        .await
    }
}

pub fn adapter_for_source(config: &SourceConfig) -> Box<dyn SourceAdapter> {
    match config.kind {
        AdapterKind::BlueGolf => Box::new(BlueGolfAdapter::new(config.clone())),
        AdapterKind::Usga => Box::new(UsgaAdapter::new(config.clone())),
    }
}

pub fn retriever_for(shape: RetrievalShape, settings: SessionSettings) -> Box<dyn Retriever> {
    match shape {
        RetrievalShape::Dom => Box::new(DomRetriever::new(settings)),
        RetrievalShape::FeedIntercept => Box::new(FeedInterceptRetriever::new(settings)),
    }
}
