//! Axum JSON API over the aggregated tournament catalog.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use fairway_core::{AgeGroup, Gender, Tournament, TournamentStatus};
use fairway_storage::SnapshotStore;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::info;

pub mod catalog;

pub use catalog::{load_catalog, Catalog, CatalogMeta, DEFAULT_SNAPSHOT_FILES};

pub const CRATE_NAME: &str = "fairway-web";

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub snapshot_files: Vec<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            data_dir: PathBuf::from("./data"),
            snapshot_files: DEFAULT_SNAPSHOT_FILES.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl WebConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: std::env::var("FAIRWAY_WEB_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            data_dir: std::env::var("FAIRWAY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            snapshot_files: std::env::var("FAIRWAY_SNAPSHOT_FILES")
                .ok()
                .map(|v| parse_file_list(&v))
                .filter(|files| !files.is_empty())
                .unwrap_or(defaults.snapshot_files),
        }
    }
}

fn parse_file_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub store: SnapshotStore,
    pub snapshot_files: Vec<String>,
}

impl AppState {
    pub fn new(data_dir: impl Into<PathBuf>, snapshot_files: Vec<String>) -> Self {
        Self {
            store: SnapshotStore::new(data_dir),
            snapshot_files,
        }
    }

    async fn catalog(&self) -> Catalog {
        load_catalog(&self.store, &self.snapshot_files).await
    }
}

/// Raw query string; blank values mean "no filter".
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentQuery {
    pub query: Option<String>,
    pub state: Option<String>,
    pub age_group: Option<String>,
    pub gender: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TournamentFilter {
    pub query: Option<String>,
    pub state: Option<String>,
    pub age_group: Option<AgeGroup>,
    pub gender: Option<Gender>,
    pub status: Option<TournamentStatus>,
}

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_variant<T: DeserializeOwned>(name: &str, value: &Option<String>) -> Result<Option<T>, String> {
    blank_to_none(value)
        .map(|v| {
            serde_json::from_value(serde_json::Value::String(v.to_string()))
                .map_err(|_| format!("unknown {name} `{v}`"))
        })
        .transpose()
}

impl TryFrom<TournamentQuery> for TournamentFilter {
    type Error = String;

    fn try_from(query: TournamentQuery) -> Result<Self, Self::Error> {
        Ok(Self {
            query: blank_to_none(&query.query).map(str::to_lowercase),
            state: blank_to_none(&query.state).map(str::to_ascii_uppercase),
            age_group: parse_variant("ageGroup", &query.age_group)?,
            gender: parse_variant("gender", &query.gender)?,
            status: parse_variant("status", &query.status)?,
        })
    }
}

impl TournamentFilter {
    pub fn matches(&self, t: &Tournament) -> bool {
        if let Some(q) = &self.query {
            let hit = t.name.to_lowercase().contains(q)
                || t.location.to_lowercase().contains(q)
                || t.course_name.to_lowercase().contains(q);
            if !hit {
                return false;
            }
        }
        self.state.as_ref().map_or(true, |s| t.state == *s)
            && self.age_group.map_or(true, |g| t.age_groups.contains(&g))
            && self.gender.map_or(true, |g| t.gender == g)
            && self.status.map_or(true, |s| t.status == s)
    }

    /// Matching records ordered by start date.
    pub fn apply(&self, tournaments: Vec<Tournament>) -> Vec<Tournament> {
        let mut hits: Vec<_> = tournaments.into_iter().filter(|t| self.matches(t)).collect();
        hits.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        hits
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/api/tournaments", get(tournaments_handler))
        .route("/api/tournaments/{id}", get(tournament_detail_handler))
        .with_state(Arc::new(state))
}

pub async fn serve(config: WebConfig) -> anyhow::Result<()> {
    let state = AppState::new(config.data_dir.clone(), config.snapshot_files.clone());
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, data_dir = %config.data_dir.display(), "serving tournament api");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    serve(WebConfig::from_env()).await
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

async fn healthz_handler() -> &'static str {
    "ok"
}

async fn tournaments_handler(State(state): State<Arc<AppState>>, Query(query): Query<TournamentQuery>) -> Response {
    let filter = match TournamentFilter::try_from(query) {
        Ok(filter) => filter,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };
    let catalog = state.catalog().await;
    Json(Catalog {
        tournaments: filter.apply(catalog.tournaments),
        ..catalog
    })
    .into_response()
}

async fn tournament_detail_handler(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let catalog = state.catalog().await;
    match catalog.tournaments.into_iter().find(|t| t.id == id) {
        Some(tournament) => Json(tournament).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("tournament {id} not found")),
    }
}
