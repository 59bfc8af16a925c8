//! Aggregated view over the per-source snapshot artifacts.

use chrono::{DateTime, Utc};
use fairway_core::Tournament;
use fairway_storage::SnapshotStore;
use serde::Serialize;
use tracing::warn;

pub const DEFAULT_SNAPSHOT_FILES: [&str; 2] = ["usga.json", "ujga.json"];

const SAMPLE_TOURNAMENTS: &str = include_str!("../data/sample_tournaments.json");

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMeta {
    pub source: String,
    pub scraped_at: Option<DateTime<Utc>>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub tournaments: Vec<Tournament>,
    pub meta: Vec<CatalogMeta>,
    pub using_mock: bool,
}

/// Built-in dataset served before any source has been scraped.
pub fn sample_tournaments() -> Vec<Tournament> {
    match serde_json::from_str(SAMPLE_TOURNAMENTS) {
        Ok(tournaments) => tournaments,
        Err(err) => {
            warn!(error = %err, "sample dataset is invalid");
            Vec::new()
        }
    }
}

/// Concatenate every readable snapshot in `files`.
///
/// Missing and malformed artifacts contribute nothing. When no records are
/// found at all the sample dataset is returned instead, flagged as such.
pub async fn load_catalog(store: &SnapshotStore, files: &[String]) -> Catalog {
    let mut tournaments = Vec::new();
    let mut meta = Vec::new();

    for file in files {
        match store.read_snapshot(file).await {
            Ok(Some(snapshot)) => {
                meta.push(CatalogMeta {
                    source: snapshot.source,
                    scraped_at: Some(snapshot.scraped_at),
                    count: snapshot.tournaments.len(),
                });
                tournaments.extend(snapshot.tournaments);
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "skipping unreadable snapshot"),
        }
    }

    if tournaments.is_empty() {
        let sample = sample_tournaments();
        return Catalog {
            meta: vec![CatalogMeta {
                source: "mock".to_string(),
                scraped_at: None,
                count: sample.len(),
            }],
            tournaments: sample,
            using_mock: true,
        };
    }

    Catalog {
        tournaments,
        meta,
        using_mock: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use fairway_core::{AgeGroup, Gender, Snapshot, TournamentStatus};
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn files() -> Vec<String> {
        DEFAULT_SNAPSHOT_FILES.iter().map(|f| f.to_string()).collect()
    }

    fn tournament(id: &str) -> Tournament {
        let date = NaiveDate::from_ymd_opt(2026, 7, 14).unwrap();
        Tournament {
            id: id.into(),
            name: "Girls' State Junior Championship".into(),
            date,
            end_date: None,
            location: "Lehi, UT".into(),
            state: "UT".into(),
            course_name: "Thanksgiving Point GC".into(),
            age_groups: BTreeSet::from([AgeGroup::U18]),
            gender: Gender::Girls,
            registration_deadline: date,
            status: TournamentStatus::Upcoming,
            entry_fee: Some(325),
            description: None,
        }
    }

    #[test]
    fn sample_dataset_is_valid() {
        let sample = sample_tournaments();
        assert_eq!(sample.len(), 6);
        for t in &sample {
            assert_eq!(t.clone().enforce_invariants(), *t);
        }
    }

    #[tokio::test]
    async fn empty_directory_falls_back_to_sample() {
        let dir = tempdir().expect("tempdir");
        let catalog = load_catalog(&SnapshotStore::new(dir.path()), &files()).await;
        assert!(catalog.using_mock);
        assert_eq!(catalog.meta.len(), 1);
        assert_eq!(catalog.meta[0].source, "mock");
        assert_eq!(catalog.meta[0].scraped_at, None);
        assert_eq!(catalog.meta[0].count, catalog.tournaments.len());
    }

    #[tokio::test]
    async fn malformed_artifact_is_skipped() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        std::fs::write(dir.path().join("usga.json"), "{\"source\":").expect("write");
        let scraped_at = Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).single().unwrap();
        store
            .write_snapshot("ujga.json", &Snapshot::new("UJGA", scraped_at, vec![tournament("ujga-0")]))
            .await
            .expect("snapshot");

        let catalog = load_catalog(&store, &files()).await;
        assert!(!catalog.using_mock);
        assert_eq!(
            catalog.meta,
            vec![CatalogMeta {
                source: "UJGA".into(),
                scraped_at: Some(scraped_at),
                count: 1,
            }]
        );
        assert_eq!(catalog.tournaments[0].id, "ujga-0");
    }

    #[tokio::test]
    async fn empty_snapshots_still_use_sample() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        let scraped_at = Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).single().unwrap();
        store
            .write_snapshot("usga.json", &Snapshot::new("USGA", scraped_at, vec![]))
            .await
            .expect("snapshot");

        let catalog = load_catalog(&store, &files()).await;
        assert!(catalog.using_mock);
        assert_eq!(catalog.meta[0].source, "mock");
    }

    #[test]
    fn meta_serializes_with_null_timestamp() {
        let meta = CatalogMeta {
            source: "mock".into(),
            scraped_at: None,
            count: 6,
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value, serde_json::json!({"source": "mock", "scrapedAt": null, "count": 6}));
    }
}
