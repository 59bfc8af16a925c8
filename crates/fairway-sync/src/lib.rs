//! Pipeline driver: runs each configured source and persists its snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fairway_adapters::{
    adapter_for_source, retriever_for, AdapterContext, RetrievalShape, Retriever, SessionSettings, SourceConfig,
};
use fairway_core::Snapshot;
use fairway_storage::SnapshotStore;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::task::JoinSet;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub mod dedup;

pub use dedup::{DedupConfig, DedupEngine};

pub const CRATE_NAME: &str = "fairway-sync";

#[derive(Debug, Clone, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceConfig>,
}

impl SourceRegistry {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing source registry")
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn enabled(&self) -> Vec<SourceConfig> {
        self.sources.iter().filter(|s| s.enabled).cloned().collect()
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub data_dir: PathBuf,
    pub workspace_root: PathBuf,
    pub http_timeout_secs: u64,
    pub grace_delay_ms: u64,
    pub parallel_sources: bool,
    pub scheduler_enabled: bool,
    pub sync_cron: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            workspace_root: PathBuf::from("."),
            http_timeout_secs: 30,
            grace_delay_ms: 2000,
            parallel_sources: false,
            scheduler_enabled: false,
            sync_cron: "0 0 6,18 * * *".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("FAIRWAY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            workspace_root: std::env::var("FAIRWAY_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_root),
            http_timeout_secs: std::env::var("FAIRWAY_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
            grace_delay_ms: std::env::var("FAIRWAY_GRACE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.grace_delay_ms),
            parallel_sources: env_flag("FAIRWAY_PARALLEL_SOURCES"),
            scheduler_enabled: env_flag("FAIRWAY_SCHEDULER_ENABLED"),
            sync_cron: std::env::var("FAIRWAY_SYNC_CRON").unwrap_or(defaults.sync_cron),
        }
    }

    pub fn registry_path(&self) -> PathBuf {
        self.workspace_root.join("sources.yaml")
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            timeout: Duration::from_secs(self.http_timeout_secs),
            grace_delay: Duration::from_millis(self.grace_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRunStatus {
    Succeeded,
    /// A bot challenge was served; an empty snapshot was written.
    Challenged,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRunReport {
    pub source_id: String,
    pub status: SourceRunStatus,
    pub raw_events: usize,
    pub tournaments: usize,
    pub dropped: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub output_path: Option<String>,
    pub content_hash: Option<String>,
    pub error: Option<String>,
}

impl SourceRunReport {
    fn failed(source_id: &str, error: String) -> Self {
        Self {
            source_id: source_id.to_string(),
            status: SourceRunStatus::Failed,
            raw_events: 0,
            tournaments: 0,
            dropped: 0,
            filtered: 0,
            duplicates: 0,
            output_path: None,
            content_hash: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub enabled_sources: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub written_tournaments: usize,
    pub sources: Vec<SourceRunReport>,
}

/// Builds the retriever for an adapter's retrieval shape.
pub type RetrieverFactory = Arc<dyn Fn(RetrievalShape) -> Box<dyn Retriever> + Send + Sync>;

pub fn browser_retrievers(settings: SessionSettings) -> RetrieverFactory {
    Arc::new(move |shape| retriever_for(shape, settings))
}

/// Everything one source run needs; cheap to clone into a task.
#[derive(Clone)]
struct SourceRunner {
    store: SnapshotStore,
    retrievers: RetrieverFactory,
    dedup: DedupEngine,
}

impl SourceRunner {
    async fn run(&self, source: SourceConfig, ctx: AdapterContext) -> SourceRunReport {
        let span = info_span!("sync_source", run_id = %ctx.run_id, source_id = %source.source_id);
        async {
            let adapter = adapter_for_source(&source);
            let retriever = (self.retrievers)(adapter.retrieval_shape());

            let output = match adapter.collect(retriever.as_ref(), &ctx).await {
                Ok(output) => output,
                Err(err) => {
                    error!(error = %err, timeout = err.is_timeout(), "source run failed; keeping previous snapshot");
                    return SourceRunReport::failed(&source.source_id, err.to_string());
                }
            };

            let (tournaments, duplicates) = self.dedup.apply(output.tournaments);
            let snapshot = Snapshot::new(source.display_name.clone(), ctx.now, tournaments);
            let stored = match self.store.write_snapshot(&source.output, &snapshot).await {
                Ok(stored) => stored,
                Err(err) => {
                    let message = format!("{err:#}");
                    error!(error = %message, "writing snapshot failed");
                    return SourceRunReport::failed(&source.source_id, message);
                }
            };
            info!(
                path = %stored.path.display(),
                tournaments = stored.tournaments,
                bytes = stored.byte_size,
                duplicates,
                "snapshot written"
            );

            SourceRunReport {
                source_id: source.source_id.clone(),
                status: if output.challenged {
                    SourceRunStatus::Challenged
                } else {
                    SourceRunStatus::Succeeded
                },
                raw_events: output.raw_events,
                tournaments: stored.tournaments,
                dropped: output.dropped,
                filtered: output.filtered,
                duplicates,
                output_path: Some(stored.path.display().to_string()),
                content_hash: Some(stored.content_hash),
                error: None,
            }
        }
        .instrument(span)
        .await
    }
}

pub struct SyncPipeline {
    config: SyncConfig,
    runner: SourceRunner,
}

impl SyncPipeline {
    pub fn new(config: SyncConfig) -> Self {
        let retrievers = browser_retrievers(config.session_settings());
        Self {
            runner: SourceRunner {
                store: SnapshotStore::new(config.data_dir.clone()),
                retrievers,
                dedup: DedupEngine::default(),
            },
            config,
        }
    }

    pub fn with_retrievers(mut self, retrievers: RetrieverFactory) -> Self {
        self.runner.retrievers = retrievers;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupEngine) -> Self {
        self.runner.dedup = dedup;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn load_source_registry(&self) -> Result<SourceRegistry> {
        SourceRegistry::load(&self.config.registry_path()).await
    }

    /// Run every enabled source in the registry.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SyncRunSummary> {
        let registry = self.load_source_registry().await?;
        Ok(self.run_sources(registry.enabled(), now).await)
    }

    /// Run the given sources. Failures are recorded per source; they never
    /// abort the run.
    pub async fn run_sources(&self, sources: Vec<SourceConfig>, now: DateTime<Utc>) -> SyncRunSummary {
        let started_at = Utc::now();
        let ctx = AdapterContext::new(now);
        let enabled_sources = sources.len();
        info!(run_id = %ctx.run_id, sources = enabled_sources, parallel = self.config.parallel_sources, "sync run started");

        let reports = if self.config.parallel_sources {
            self.run_parallel(sources, &ctx).await
        } else {
            let mut reports = Vec::with_capacity(sources.len());
            for source in sources {
                reports.push(self.runner.run(source, ctx.clone()).await);
            }
            reports
        };

        let failed = reports.iter().filter(|r| r.status == SourceRunStatus::Failed).count();
        let summary = SyncRunSummary {
            run_id: ctx.run_id,
            started_at,
            finished_at: Utc::now(),
            enabled_sources,
            succeeded: reports.len() - failed,
            failed,
            written_tournaments: reports.iter().map(|r| r.tournaments).sum(),
            sources: reports,
        };
        if summary.failed > 0 {
            warn!(run_id = %summary.run_id, failed = summary.failed, "sync run finished with failures");
        } else {
            info!(run_id = %summary.run_id, tournaments = summary.written_tournaments, "sync run finished");
        }
        summary
    }

    async fn run_parallel(&self, sources: Vec<SourceConfig>, ctx: &AdapterContext) -> Vec<SourceRunReport> {
        let mut set = JoinSet::new();
        let ids: Vec<String> = sources.iter().map(|s| s.source_id.clone()).collect();
        for (index, source) in sources.into_iter().enumerate() {
            let runner = self.runner.clone();
            let ctx = ctx.clone();
            set.spawn(async move { (index, runner.run(source, ctx).await) });
        }

        let mut slots: Vec<Option<SourceRunReport>> = vec![None; ids.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(err) => error!(error = %err, "source task aborted"),
            }
        }

        slots
            .into_iter()
            .zip(ids)
            .map(|(slot, id)| slot.unwrap_or_else(|| SourceRunReport::failed(&id, "source task aborted".to_string())))
            .collect()
    }

    /// Cron job re-running the pipeline, when enabled. The caller starts it.
    pub async fn maybe_build_scheduler(self: Arc<Self>) -> Result<Option<JobScheduler>> {
        if !self.config.scheduler_enabled {
            return Ok(None);
        }

        let sched = JobScheduler::new().await.context("creating scheduler")?;
        let cron = self.config.sync_cron.clone();
        let pipeline = Arc::clone(&self);
        let job = Job::new_async(cron.as_str(), move |_uuid, _l| {
            let pipeline = Arc::clone(&pipeline);
            Box::pin(async move {
                match pipeline.run_once(Utc::now()).await {
                    Ok(summary) => info!(run_id = %summary.run_id, failed = summary.failed, "scheduled sync complete"),
                    Err(err) => {
                        let message = format!("{err:#}");
                        error!(error = %message, "scheduled sync failed");
                    }
                }
            })
        })
        .with_context(|| format!("creating scheduler job for cron {cron}"))?;
        sched.add(job).await.context("adding scheduler job")?;
        info!(%cron, "sync scheduler configured");
        Ok(Some(sched))
    }
}

pub async fn run_sync_once_from_env() -> Result<SyncRunSummary> {
    SyncPipeline::new(SyncConfig::from_env()).run_once(Utc::now()).await
}
