use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use fairway_storage::SnapshotStore;
use fairway_sync::{SyncConfig, SyncPipeline};
use fairway_web::{load_catalog, WebConfig};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "fairway-cli")]
#[command(about = "Junior golf tournament scraper and catalog API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape every enabled source (or only those named) and write snapshots.
    Scrape {
        #[arg(long = "source")]
        sources: Vec<String>,
    },
    /// Serve the tournament API; also runs the sync scheduler when enabled.
    Serve,
    /// Print the aggregated catalog built from the current snapshots.
    Catalog,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fairway=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Scrape { sources: Vec::new() }) {
        Commands::Scrape { sources } => scrape(sources).await?,
        Commands::Serve => serve().await?,
        Commands::Catalog => {
            let config = WebConfig::from_env();
            let catalog = load_catalog(&SnapshotStore::new(&config.data_dir), &config.snapshot_files).await;
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
    }

    Ok(())
}

async fn scrape(only: Vec<String>) -> Result<()> {
    let pipeline = SyncPipeline::new(SyncConfig::from_env());
    let registry = pipeline.load_source_registry().await?;
    let mut selected = registry.enabled();
    if !only.is_empty() {
        for id in &only {
            if !registry.sources.iter().any(|s| &s.source_id == id) {
                bail!("unknown source `{id}`");
            }
        }
        selected = registry
            .sources
            .into_iter()
            .filter(|s| only.contains(&s.source_id))
            .collect();
    }

    let summary = pipeline.run_sources(selected, Utc::now()).await;
    for report in &summary.sources {
        println!(
            "{}: {:?} tournaments={} dropped={} filtered={} duplicates={}{}",
            report.source_id,
            report.status,
            report.tournaments,
            report.dropped,
            report.filtered,
            report.duplicates,
            report.error.as_deref().map(|e| format!(" error={e}")).unwrap_or_default()
        );
    }
    println!(
        "scrape complete: run_id={} sources={} failed={} tournaments={}",
        summary.run_id, summary.enabled_sources, summary.failed, summary.written_tournaments
    );
    if summary.failed > 0 {
        bail!("{} of {} sources failed", summary.failed, summary.enabled_sources);
    }
    Ok(())
}

async fn serve() -> Result<()> {
    let pipeline = Arc::new(SyncPipeline::new(SyncConfig::from_env()));
    let scheduler = match pipeline.maybe_build_scheduler().await? {
        Some(scheduler) => {
            scheduler.start().await?;
            info!("sync scheduler started");
            Some(scheduler)
        }
        None => {
            info!("sync scheduler disabled");
            None
        }
    };

    let result = fairway_web::serve(WebConfig::from_env()).await;
    if let Some(mut scheduler) = scheduler {
        scheduler.shutdown().await?;
    }
    result
}
