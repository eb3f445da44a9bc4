//! Data source abstraction for layer payloads.
//!
//! This module defines the `DataSource` trait and its implementations:
//! - Filesystem (paths resolved under a root directory)
//! - Remote HTTP(S)
//! - In-memory (tests and preloaded bundles)
//! - Routed (HTTP URLs to one source, everything else to another)
//!
//! Sources return raw bytes; decoding belongs to the `formats` crate.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

/// Error type for data source operations.
#[derive(Debug)]
pub struct DataSourceError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DataSourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl DataSourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A backend that resolves a location (URL or path) to bytes.
///
/// Methods return boxed futures for dyn-compatibility.
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the whole payload at `location`. Missing payloads are errors.
    fn fetch(&self, location: &str) -> BoxFuture<'_, Result<Vec<u8>, DataSourceError>>;
}

pub fn is_http_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Filesystem source: locations are relative paths under `root`.
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let relative = location.trim_start_matches("file://").trim_start_matches('/');
        self.root.join(relative)
    }
}

impl DataSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn fetch(&self, location: &str) -> BoxFuture<'_, Result<Vec<u8>, DataSourceError>> {
        let path = self.resolve(location);
        Box::pin(async move {
            tokio::fs::read(&path).await.map_err(|e| {
                DataSourceError::with_source(format!("Failed to read {}", path.display()), e)
            })
        })
    }
}

/// HTTP(S) source.
pub struct HttpSource {
    client: reqwest::Client,
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl DataSource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch(&self, location: &str) -> BoxFuture<'_, Result<Vec<u8>, DataSourceError>> {
        let url = location.to_string();
        Box::pin(async move {
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| DataSourceError::with_source("HTTP request failed", e))?;

            if !resp.status().is_success() {
                return Err(DataSourceError::new(format!(
                    "HTTP error: {} for {url}",
                    resp.status()
                )));
            }

            let bytes = resp
                .bytes()
                .await
                .map_err(|e| DataSourceError::with_source("Failed to read response", e))?;

            Ok(bytes.to_vec())
        })
    }
}

/// In-memory source keyed by location. Counts fetches.
#[derive(Default)]
pub struct MemorySource {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemorySource::insert`] for use before sharing.
    pub fn with(mut self, location: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.entries.get_mut().insert(location.into(), data.into());
        self
    }

    pub async fn insert(&self, location: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.entries
            .write()
            .await
            .insert(location.into(), data.into());
    }

    pub async fn remove(&self, location: &str) -> Option<Vec<u8>> {
        self.entries.write().await.remove(location)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl DataSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(&self, location: &str) -> BoxFuture<'_, Result<Vec<u8>, DataSourceError>> {
        let location = location.to_string();
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            self.entries
                .read()
                .await
                .get(&location)
                .cloned()
                .ok_or_else(|| DataSourceError::new(format!("No entry for {location}")))
        })
    }
}

/// Sends `http://` / `https://` locations to one source and everything else
/// to another.
pub struct RoutedSource {
    http: Arc<dyn DataSource>,
    local: Arc<dyn DataSource>,
}

impl RoutedSource {
    pub fn new(http: Arc<dyn DataSource>, local: Arc<dyn DataSource>) -> Self {
        Self { http, local }
    }

    /// HTTP plus a filesystem source rooted at `root`.
    pub fn with_file_root(root: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(HttpSource::new()), Arc::new(FileSource::new(root)))
    }
}

impl DataSource for RoutedSource {
    fn name(&self) -> &str {
        "routed"
    }

    fn fetch(&self, location: &str) -> BoxFuture<'_, Result<Vec<u8>, DataSourceError>> {
        let target = if is_http_url(location) {
            &self.http
        } else {
            &self.local
        };
        tracing::debug!(location, source = target.name(), "routing fetch");
        target.fetch(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_source_counts_every_fetch() {
        let source = MemorySource::new().with("data/a.json", b"[1]".to_vec());
        assert_eq!(source.fetch("data/a.json").await.unwrap(), b"[1]");
        assert_eq!(source.fetch("data/a.json").await.unwrap(), b"[1]");
        assert_eq!(source.fetch_count(), 2);

        let err = source.fetch("missing.json").await.unwrap_err();
        assert_eq!(err.to_string(), "No entry for missing.json");
    }

    #[tokio::test]
    async fn file_source_reads_under_root() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("data"))
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("data/world.json"), b"{}")
            .await
            .unwrap();

        let source = FileSource::new(dir.path());
        assert_eq!(source.fetch("data/world.json").await.unwrap(), b"{}");
        assert_eq!(source.fetch("/data/world.json").await.unwrap(), b"{}");

        let err = source.fetch("data/none.json").await.unwrap_err();
        assert!(err.message.starts_with("Failed to read"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn routed_source_splits_on_scheme() {
        let http = Arc::new(MemorySource::new().with("https://example.org/a.csv", b"remote".to_vec()));
        let local = Arc::new(MemorySource::new().with("a.csv", b"local".to_vec()));
        let routed = RoutedSource::new(http.clone(), local.clone());

        assert_eq!(routed.fetch("https://example.org/a.csv").await.unwrap(), b"remote");
        assert_eq!(routed.fetch("a.csv").await.unwrap(), b"local");
        assert_eq!(http.fetch_count(), 1);
        assert_eq!(local.fetch_count(), 1);
    }
}
