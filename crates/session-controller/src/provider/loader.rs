//! Engine script loading.
//!
//! [`ScriptLoader`] memoizes loaded scripts by URL. Concurrent and repeated
//! acquisitions of the same URL share one fetch; each acquisition returns a
//! [`ScriptLease`] and the loader tracks how many leases are live. Failed
//! loads are never memoized, so the next acquisition retries.

use crate::observability::metrics;
use async_trait::async_trait;
use bytes::Bytes;
use common::error::CollaboratorError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Script load failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScriptLoadError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("script at {0} is empty")]
    Empty(String),
}

/// Fetches raw script bytes.
#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    /// Fetch the resource at `url`.
    async fn fetch(&self, url: &str) -> Result<Bytes, CollaboratorError>;
}

/// HTTP fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpScriptFetcher {
    http_client: reqwest::Client,
}

impl HttpScriptFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(target: "session.provider.loader", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self { http_client }
    }
}

#[async_trait]
impl ScriptFetcher for HttpScriptFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, CollaboratorError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::Transport(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| CollaboratorError::Transport(e.to_string()))
    }
}

/// A successfully loaded engine script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedScript {
    url: String,
    source: Bytes,
}

impl LoadedScript {
    #[must_use]
    pub fn new(url: impl Into<String>, source: Bytes) -> Self {
        Self {
            url: url.into(),
            source,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn source(&self) -> &Bytes {
        &self.source
    }
}

struct Entry {
    cell: Arc<OnceCell<Arc<LoadedScript>>>,
    leases: usize,
}

type Entries = Mutex<HashMap<String, Entry>>;

/// Memoizing, lease-counting script loader. Cheap to clone.
#[derive(Clone)]
pub struct ScriptLoader {
    fetcher: Arc<dyn ScriptFetcher>,
    entries: Arc<Entries>,
}

impl ScriptLoader {
    #[must_use]
    pub fn new(fetcher: Arc<dyn ScriptFetcher>) -> Self {
        Self {
            fetcher,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Load (or reuse) the script at `url` and take a lease on it.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptLoadError`] if the fetch fails or the body is empty.
    #[instrument(skip_all, name = "session.provider.loader", fields(url = %url))]
    pub async fn acquire(&self, url: &str) -> Result<ScriptLease, ScriptLoadError> {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = entries.entry(url.to_string()).or_insert_with(|| Entry {
                cell: Arc::new(OnceCell::new()),
                leases: 0,
            });
            entry.leases += 1;
            Arc::clone(&entry.cell)
        };

        // Releases the lease count if the load fails or this future is dropped.
        let guard = LeaseGuard {
            entries: Arc::downgrade(&self.entries),
            url: url.to_string(),
        };

        if let Some(script) = cell.get() {
            debug!(target: "session.provider.loader", url = %url, "Engine script reused");
            metrics::record_script_load("cached");
            return Ok(ScriptLease {
                script: Arc::clone(script),
                _guard: guard,
            });
        }

        let script = cell
            .get_or_try_init(|| self.fetch(url))
            .await
            .inspect_err(|_| metrics::record_script_load("failed"))?;

        Ok(ScriptLease {
            script: Arc::clone(script),
            _guard: guard,
        })
    }

    async fn fetch(&self, url: &str) -> Result<Arc<LoadedScript>, ScriptLoadError> {
        debug!(target: "session.provider.loader", url = %url, "Fetching engine script");

        let source = self.fetcher.fetch(url).await.map_err(|e| {
            warn!(target: "session.provider.loader", url = %url, error = %e, "Engine script fetch failed");
            ScriptLoadError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        if source.is_empty() {
            warn!(target: "session.provider.loader", url = %url, "Engine script body is empty");
            return Err(ScriptLoadError::Empty(url.to_string()));
        }

        info!(
            target: "session.provider.loader",
            url = %url,
            bytes = source.len(),
            "Engine script loaded"
        );
        metrics::record_script_load("fetched");

        Ok(Arc::new(LoadedScript::new(url, source)))
    }

    /// Number of live leases on `url`.
    #[must_use]
    pub fn live_leases(&self, url: &str) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .map_or(0, |e| e.leases)
    }

    /// Whether a loaded script for `url` is memoized.
    #[must_use]
    pub fn is_loaded(&self, url: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .is_some_and(|e| e.cell.initialized())
    }

    /// Forget every memoized script that has no live lease.
    ///
    /// Returns the number of scripts released.
    pub fn purge_idle(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, e| e.leases > 0);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(target: "session.provider.loader", purged, "Released idle engine scripts");
        }
        purged
    }
}

struct LeaseGuard {
    entries: Weak<Entries>,
    url: String,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Some(entries) = self.entries.upgrade() else {
            return;
        };
        let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
        let remove = match entries.get_mut(&self.url) {
            Some(entry) => {
                entry.leases = entry.leases.saturating_sub(1);
                // A failed load leaves nothing worth keeping.
                entry.leases == 0 && !entry.cell.initialized()
            }
            None => false,
        };
        if remove {
            entries.remove(&self.url);
        }
    }
}

/// A live reference to a loaded script. Dropping it releases the lease.
pub struct ScriptLease {
    script: Arc<LoadedScript>,
    _guard: LeaseGuard,
}

impl ScriptLease {
    #[must_use]
    pub fn script(&self) -> &LoadedScript {
        &self.script
    }
}

impl std::fmt::Debug for ScriptLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptLease")
            .field("url", &self.script.url)
            .finish()
    }
}
