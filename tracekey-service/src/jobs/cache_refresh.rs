//! Cache Refresh Background Task
//!
//! Incremental cache appends can be lost (a failed add after a durable
//! write) or overwritten (an add racing a full replacement). This task
//! re-hydrates the cache from the repository on a fixed interval so the
//! export converges on the repository contents within one interval.
//!
//! Failures are logged and counted, and the next tick retries. Every cycle
//! re-publishes [`ServiceState::Ready`], failed ones included. The task only
//! ends when the shutdown signal fires or its sender is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracekey_core::TracekeyResult;

use crate::constants::MIN_CACHE_REFRESH_INTERVAL;
use crate::hydrate::Hydrator;
use crate::service::ServiceState;

// ============================================================================
// METRICS
// ============================================================================

/// Counters for cache refresh activity.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
    /// Refresh cycles run since startup
    pub refresh_cycles: AtomicU64,

    /// Refresh cycles that failed
    pub refresh_errors: AtomicU64,

    /// Cache size after the last successful refresh
    pub last_size_bytes: AtomicU64,
}

impl RefreshMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> RefreshSnapshot {
        RefreshSnapshot {
            refresh_cycles: self.refresh_cycles.load(Ordering::Relaxed),
            refresh_errors: self.refresh_errors.load(Ordering::Relaxed),
            last_size_bytes: self.last_size_bytes.load(Ordering::Relaxed),
        }
    }

    fn record(&self, result: &TracekeyResult<u64>) {
        self.refresh_cycles.fetch_add(1, Ordering::Relaxed);
        match result {
            Ok(size) => {
                self.last_size_bytes.store(*size, Ordering::Relaxed);
                tracing::info!(size = *size, "Cache refreshed");
            }
            Err(e) => {
                self.refresh_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %e, "Could not refresh cache");
            }
        }
    }
}

/// Snapshot of refresh metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSnapshot {
    pub refresh_cycles: u64,
    pub refresh_errors: u64,
    pub last_size_bytes: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Resolves once shutdown is requested or the signal's sender is gone.
async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

/// Background task that periodically re-hydrates the cache.
///
/// The first refresh runs one `refresh_interval` after the task starts;
/// missed ticks are skipped rather than bunched up. An interval shorter than
/// [`MIN_CACHE_REFRESH_INTERVAL`] is raised to it. A hydration still in
/// flight when shutdown fires is abandoned.
///
/// # Arguments
///
/// * `hydrator` - Repository-to-cache copier
/// * `refresh_interval` - Time between refreshes
/// * `metrics` - Counters updated after every cycle
/// * `state` - Lifecycle channel, set to `Ready` after every cycle
/// * `shutdown_rx` - Watch receiver for shutdown signal
///
/// # Returns
///
/// The metrics handle, once the task has stopped
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let metrics = Arc::new(RefreshMetrics::new());
///
/// let handle = tokio::spawn(cache_refresh_task(
///     hydrator,
///     Duration::from_secs(300),
///     Arc::clone(&metrics),
///     state,
///     shutdown_rx,
/// ));
///
/// // Later, trigger shutdown
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn cache_refresh_task(
    hydrator: Arc<Hydrator>,
    refresh_interval: Duration,
    metrics: Arc<RefreshMetrics>,
    state: Arc<watch::Sender<ServiceState>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<RefreshMetrics> {
    if refresh_interval < MIN_CACHE_REFRESH_INTERVAL {
        tracing::warn!(
            requested_ms = refresh_interval.as_millis() as u64,
            "Cache refresh interval too short, using the minimum"
        );
    }
    let refresh_interval = refresh_interval.max(MIN_CACHE_REFRESH_INTERVAL);
    let mut ticker = interval_at(Instant::now() + refresh_interval, refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        refresh_interval_secs = refresh_interval.as_secs(),
        "Cache refresh task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown_rx) => break,

            _ = ticker.tick() => {
                tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut shutdown_rx) => break,
                    result = hydrator.hydrate() => metrics.record(&result),
                }
                state.send_replace(ServiceState::Ready);
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        refresh_cycles = snapshot.refresh_cycles,
        refresh_errors = snapshot.refresh_errors,
        last_size_bytes = snapshot.last_size_bytes,
        "Cache refresh task stopped"
    );

    metrics
}

// ============================================================================
// TESTS
// ============================================================================
