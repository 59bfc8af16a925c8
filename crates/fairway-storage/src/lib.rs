//! Snapshot artifact storage + HTTP fetch utilities for Fairway.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use fairway_core::Snapshot;
use rand::seq::SliceRandom;
use reqwest::header::{self, HeaderMap, HeaderValue};
pub use reqwest::Url;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "fairway-storage";

const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7; rv:121.0) Gecko/20100101 Firefox/121.0",
];

const ACCEPT_LANGUAGES: [&str; 3] = ["en-US,en;q=0.9", "en-US,en;q=0.8", "en-GB,en-US;q=0.9,en;q=0.8"];

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Browser-like client identity presented to upstream sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: String,
    pub accept_language: String,
}

impl ClientIdentity {
    /// Draw a realistic desktop identity at random.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            user_agent: USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]).to_string(),
            accept_language: ACCEPT_LANGUAGES
                .choose(&mut rng)
                .copied()
                .unwrap_or(ACCEPT_LANGUAGES[0])
                .to_string(),
        }
    }

    fn default_headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&self.user_agent).context("user agent header")?,
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_str(&self.accept_language).context("accept-language header")?,
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        Ok(headers)
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENTS[0].to_string(),
            accept_language: ACCEPT_LANGUAGES[0].to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub identity: ClientIdentity,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            identity: ClientIdentity::default(),
        }
    }
}

/// One HTTP client with a fixed identity and a shared cookie jar.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    identity: ClientIdentity,
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub final_url: String,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request { source, .. } if source.is_timeout())
    }
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .timeout(config.timeout)
            .default_headers(config.identity.default_headers()?)
            .build()
            .context("building reqwest client")?;

        Ok(Self {
            client,
            identity: config.identity,
        })
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// GET `url` and read the whole body. Non-2xx statuses are errors; there
    /// are no retries, the client timeout bounds the call.
    pub async fn fetch_bytes(&self, source_id: &str, url: &str) -> Result<FetchedResponse, FetchError> {
        let span = info_span!("http_fetch", source_id, url);
        async {
            let resp = self.client.get(url).send().await.map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

            let status = resp.status();
            let final_url = resp.url().to_string();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: final_url,
                });
            }

            let body = resp
                .bytes()
                .await
                .map_err(|source| FetchError::Request {
                    url: final_url.clone(),
                    source,
                })?
                .to_vec();
            debug!(status = status.as_u16(), bytes = body.len(), "fetched");

            Ok(FetchedResponse { final_url, body })
        }
        .instrument(span)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub path: PathBuf,
    pub content_hash: String,
    pub byte_size: usize,
    pub tournaments: usize,
}

#[derive(Debug, Error)]
pub enum SnapshotReadError {
    #[error("reading snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed snapshot {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Directory of per-source snapshot artifacts with fixed file names.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// Replace the artifact at `file_name` via a temp file and atomic rename.
    pub async fn write_snapshot(&self, file_name: &str, snapshot: &Snapshot) -> anyhow::Result<StoredSnapshot> {
        let path = self.path_for(file_name);
        let bytes = serde_json::to_vec_pretty(snapshot)
            .with_context(|| format!("serializing snapshot for {}", snapshot.source))?;

        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating snapshot directory {}", self.root.display()))?;

        let temp_path = self.root.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening temp snapshot file {}", temp_path.display()))?;
        file.write_all(&bytes)
            .await
            .with_context(|| format!("writing temp snapshot file {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp snapshot file {}", temp_path.display()))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err).with_context(|| {
                format!(
                    "atomically renaming temp snapshot {} -> {}",
                    temp_path.display(),
                    path.display()
                )
            });
        }

        Ok(StoredSnapshot {
            path,
            content_hash: Self::sha256_hex(&bytes),
            byte_size: bytes.len(),
            tournaments: snapshot.tournaments.len(),
        })
    }

    /// Read an artifact; `Ok(None)` when the file does not exist.
    pub async fn read_snapshot(&self, file_name: &str) -> Result<Option<Snapshot>, SnapshotReadError> {
        let path = self.path_for(file_name);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SnapshotReadError::Io { path, source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| SnapshotReadError::Malformed { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use tempfile::tempdir;

    fn scraped_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-24T12:00:00Z")
            .expect("ts")
            .with_timezone(&Utc)
    }

    #[test]
    fn snapshot_hashing_is_stable() {
        let hash = SnapshotStore::sha256_hex(b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn random_identity_comes_from_known_browsers() {
        for _ in 0..20 {
            let identity = ClientIdentity::random();
            assert!(USER_AGENTS.contains(&identity.user_agent.as_str()));
            assert!(ACCEPT_LANGUAGES.contains(&identity.accept_language.as_str()));
        }
    }

    #[tokio::test]
    async fn writes_overwrite_previous_snapshot() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path().join("data"));

        let first = store
            .write_snapshot("ujga.json", &Snapshot::new("UJGA", scraped_at(), vec![]))
            .await
            .expect("first write");
        let later = scraped_at() + chrono::Duration::hours(6);
        let second = store
            .write_snapshot("ujga.json", &Snapshot::new("UJGA", later, vec![]))
            .await
            .expect("second write");

        assert_eq!(first.path, second.path);
        assert_ne!(first.content_hash, second.content_hash);
        let on_disk = std::fs::metadata(&second.path).expect("metadata").len();
        assert_eq!(second.byte_size as u64, on_disk);
        let read = store.read_snapshot("ujga.json").await.expect("read").expect("present");
        assert_eq!(read.scraped_at, later);
        assert!(read.tournaments.is_empty());

        let leftovers = std::fs::read_dir(store.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn missing_snapshot_reads_as_none() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        assert!(store.read_snapshot("usga.json").await.expect("read").is_none());
    }

    #[tokio::test]
    async fn malformed_snapshot_is_reported() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("usga.json"), "{ not json").unwrap();
        let store = SnapshotStore::new(dir.path());
        let err = store.read_snapshot("usga.json").await.unwrap_err();
        assert!(matches!(err, SnapshotReadError::Malformed { .. }));
    }
}
