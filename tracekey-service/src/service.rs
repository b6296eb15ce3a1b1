//! Service for storing, caching and exporting Diagnosis Keys.
//!
//! Uploads are written to the repository synchronously and appended to the
//! cache in the background. Exports are served from the cache only. A
//! background job re-hydrates the cache from the repository on a fixed
//! interval, which repairs any append that was lost or overwritten.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracekey_core::{DiagnosisKey, Timestamp, TracekeyResult, ValidationError};
use tracekey_storage::{
    CacheStats, DiagnosisKeyCache, DiagnosisKeyRepository, MemoryCache, SnapshotReader,
};

use crate::config::ServiceConfig;
use crate::hydrate::Hydrator;
use crate::jobs::{cache_refresh_task, RefreshMetrics, RefreshSnapshot};

/// Lifecycle of a [`Service`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    /// Constructed, nothing loaded yet
    Uninitialized,
    /// Initial hydration in progress
    Hydrating,
    /// Serving; every periodic refresh re-publishes this state
    Ready,
    /// Refresh job cancelled
    Stopped,
}

struct ServiceInner {
    repository: Arc<dyn DiagnosisKeyRepository>,
    cache: Arc<dyn DiagnosisKeyCache>,
    hydrator: Arc<Hydrator>,
    config: ServiceConfig,
    state: Arc<watch::Sender<ServiceState>>,
    shutdown_tx: watch::Sender<bool>,
    refresh: Mutex<Option<JoinHandle<Arc<RefreshMetrics>>>>,
    metrics: Arc<RefreshMetrics>,
}

/// Orchestrates the repository, the cache and the refresh job.
///
/// Cloning is cheap; all clones share the same cache and refresh job.
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

impl Service {
    /// Hydrate the cache and start the refresh job.
    ///
    /// Without an injected cache a fresh, empty [`MemoryCache`] is built from
    /// `config.cache`. An unset (zero) batch size takes the default. Fails if
    /// the configuration is invalid or the initial hydration fails.
    pub async fn start(
        repository: Arc<dyn DiagnosisKeyRepository>,
        cache: Option<Arc<dyn DiagnosisKeyCache>>,
        config: ServiceConfig,
    ) -> TracekeyResult<Self> {
        let config = config.with_defaults_for_unset();
        config.validate()?;

        let cache: Arc<dyn DiagnosisKeyCache> = match cache {
            Some(cache) => cache,
            None => Arc::new(MemoryCache::with_config(config.cache.clone())),
        };
        let state = Arc::new(watch::Sender::new(ServiceState::Uninitialized));
        let hydrator = Arc::new(Hydrator::new(Arc::clone(&repository), Arc::clone(&cache)));

        state.send_replace(ServiceState::Hydrating);
        let size = hydrator.hydrate().await.inspect_err(|e| {
            tracing::error!(error = %e, "Could not hydrate cache");
        })?;
        tracing::info!(size, "Cache hydrated");
        state.send_replace(ServiceState::Ready);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(RefreshMetrics::new());
        let refresh = tokio::spawn(cache_refresh_task(
            Arc::clone(&hydrator),
            config.refresh_interval,
            Arc::clone(&metrics),
            Arc::clone(&state),
            shutdown_rx,
        ));

        Ok(Self {
            inner: Arc::new(ServiceInner {
                repository,
                cache,
                hydrator,
                config,
                state,
                shutdown_tx,
                refresh: Mutex::new(Some(refresh)),
                metrics,
            }),
        })
    }

    /// Check an upload batch against the configured limits.
    pub fn validate_batch(&self, keys: &[DiagnosisKey]) -> Result<(), ValidationError> {
        let max = self.inner.config.max_upload_batch_size;
        if keys.is_empty() {
            return Err(ValidationError::NilDiagnosisKeys);
        }
        if keys.len() > max {
            return Err(ValidationError::MaxUploadExceeded {
                max,
                got: keys.len(),
            });
        }
        Ok(())
    }

    /// Persist a batch of keys to the repository.
    ///
    /// The repository write completes before this returns. The cache is
    /// updated in the background; a failure there is logged and repaired by
    /// the next refresh.
    pub async fn store_diagnosis_keys(&self, keys: &[DiagnosisKey]) -> TracekeyResult<()> {
        self.validate_batch(keys)?;

        let now = Utc::now();
        let repository = &self.inner.repository;
        repository.store_diagnosis_keys(keys, now).await?;

        let cache = Arc::clone(&self.inner.cache);
        let batch: Vec<DiagnosisKey> = keys.iter().map(|key| key.with_uploaded_at(now)).collect();
        tokio::spawn(async move {
            match cache.add(&batch, now).await {
                Ok(()) => tracing::info!(count = batch.len(), "Cached new diagnosis keys"),
                Err(e) => tracing::error!(error = %e, "Could not add to cache"),
            }
        });

        Ok(())
    }

    /// Fetch every key from the repository, bypassing the cache.
    pub async fn find_all_diagnosis_keys(&self) -> TracekeyResult<Vec<DiagnosisKey>> {
        self.inner.repository.find_all_diagnosis_keys().await
    }

    /// Re-hydrate the cache now. Returns the cache size in bytes.
    pub async fn hydrate(&self) -> TracekeyResult<u64> {
        self.inner.hydrator.hydrate().await
    }

    /// Export view of the cache.
    ///
    /// With `since`, only keys uploaded on that day (truncated) or later.
    pub async fn reader(&self, since: Option<Timestamp>) -> TracekeyResult<SnapshotReader> {
        self.inner.cache.reader(since).await
    }

    /// Timestamp of the latest cached upload.
    pub async fn last_modified(&self) -> TracekeyResult<Timestamp> {
        self.inner.cache.last_modified().await
    }

    /// Maximum number of keys accepted per upload.
    pub fn max_upload_batch_size(&self) -> usize {
        self.inner.config.max_upload_batch_size
    }

    pub async fn cache_stats(&self) -> TracekeyResult<CacheStats> {
        self.inner.cache.stats().await
    }

    /// Refresh job counters.
    pub fn metrics(&self) -> RefreshSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn state(&self) -> ServiceState {
        *self.inner.state.borrow()
    }

    /// Subscribe to lifecycle changes, including the `Ready` published after
    /// every periodic refresh.
    pub fn watch_state(&self) -> watch::Receiver<ServiceState> {
        self.inner.state.subscribe()
    }

    /// Stop the refresh job and wait for it to exit.
    ///
    /// Exports keep working from the last snapshot. Calling this again is a
    /// no-op.
    pub async fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(true);

        let handle = self.inner.refresh.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Cache refresh task panicked");
            }
        }

        self.inner.state.send_replace(ServiceState::Stopped);
    }
}
