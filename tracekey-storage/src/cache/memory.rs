//! In-memory snapshot cache, the default [`DiagnosisKeyCache`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracekey_core::{encode, CacheError, DayBoundary, DiagnosisKey, Timestamp, TracekeyResult};

use super::reader::SnapshotReader;
use super::snapshot::Snapshot;
use super::traits::{CacheStats, DiagnosisKeyCache};
use crate::constants::{
    DEFAULT_CACHE_MAX_SEGMENTS, ENV_CACHE_MAX_SEGMENTS, ENV_DAY_BOUNDARY_OFFSET_SECS,
};

/// Configuration for the in-memory cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// How upload timestamps map onto index days.
    pub day_boundary: DayBoundary,
    /// Appended segments kept before coalescing into one buffer.
    pub max_segments: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            day_boundary: DayBoundary::utc(),
            max_segments: DEFAULT_CACHE_MAX_SEGMENTS,
        }
    }
}

impl MemoryCacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create MemoryCacheConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `TRACEKEY_DAY_BOUNDARY_OFFSET_SECS`: day boundary, seconds east of UTC (default: 0)
    /// - `TRACEKEY_CACHE_MAX_SEGMENTS`: segments kept before coalescing (default: 64)
    ///
    /// Unparseable or out-of-range values fall back to the defaults.
    pub fn from_env() -> Self {
        let day_boundary = std::env::var(ENV_DAY_BOUNDARY_OFFSET_SECS)
            .ok()
            .and_then(|s| s.parse().ok())
            .and_then(|secs| DayBoundary::with_offset_seconds(secs).ok())
            .unwrap_or_default();

        let max_segments = std::env::var(ENV_CACHE_MAX_SEGMENTS)
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_CACHE_MAX_SEGMENTS);

        Self {
            day_boundary,
            max_segments,
        }
    }

    /// Set the day boundary.
    pub fn with_day_boundary(mut self, day_boundary: DayBoundary) -> Self {
        self.day_boundary = day_boundary;
        self
    }

    /// Set the segment limit.
    pub fn with_max_segments(mut self, max_segments: usize) -> Self {
        self.max_segments = max_segments;
        self
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    sets: AtomicU64,
    adds: AtomicU64,
    readers: AtomicU64,
}

/// Process-local cache holding one published [`Snapshot`].
///
/// Writers hold the write lock only long enough to derive and publish the
/// next snapshot; readers hold the read lock only long enough to clone the
/// current `Arc`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    current: RwLock<Arc<Snapshot>>,
    config: MemoryCacheConfig,
    counters: CacheCounters,
}

impl MemoryCache {
    /// Create an empty cache with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache.
    pub fn with_config(config: MemoryCacheConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty())),
            config,
            counters: CacheCounters::default(),
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &MemoryCacheConfig {
        &self.config
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> TracekeyResult<Arc<Snapshot>> {
        let current = self.current.read().map_err(|_| CacheError::LockPoisoned)?;
        Ok(Arc::clone(&current))
    }

    fn since_offset(&self, snapshot: &Snapshot, since: Option<Timestamp>) -> u64 {
        match since {
            None => 0,
            Some(ts) => snapshot.offset_since(self.config.day_boundary.truncate(ts)),
        }
    }
}

#[async_trait]
impl DiagnosisKeyCache for MemoryCache {
    async fn set(&self, keys: &[DiagnosisKey], last_modified: Timestamp) -> TracekeyResult<()> {
        let boundary = &self.config.day_boundary;
        let next = Arc::new(Snapshot::build(keys, last_modified, boundary));
        let size = next.len();
        let days = next.indexed_days();

        {
            let mut current = self.current.write().map_err(|_| CacheError::LockPoisoned)?;
            *current = next;
        }

        self.counters.sets.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(size, days, "Replaced cache snapshot");
        Ok(())
    }

    async fn add(&self, keys: &[DiagnosisKey], uploaded_at: Timestamp) -> TracekeyResult<()> {
        let data = encode(keys);

        {
            let mut current = self.current.write().map_err(|_| CacheError::LockPoisoned)?;
            let next = current.append_encoded(
                data,
                uploaded_at,
                &self.config.day_boundary,
                self.config.max_segments,
            );
            *current = Arc::new(next);
        }

        self.counters.adds.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn reader(&self, since: Option<Timestamp>) -> TracekeyResult<SnapshotReader> {
        let snapshot = self.snapshot()?;
        let start = self.since_offset(&snapshot, since);
        self.counters.readers.fetch_add(1, Ordering::Relaxed);
        Ok(SnapshotReader::new(snapshot, start))
    }

    async fn last_modified(&self) -> TracekeyResult<Timestamp> {
        Ok(self.snapshot()?.last_modified())
    }

    async fn stats(&self) -> TracekeyResult<CacheStats> {
        let snapshot = self.snapshot()?;
        Ok(CacheStats {
            key_count: snapshot.key_count(),
            size_bytes: snapshot.len(),
            segment_count: snapshot.segment_count() as u64,
            indexed_days: snapshot.indexed_days() as u64,
            sets: self.counters.sets.load(Ordering::Relaxed),
            adds: self.counters.adds.load(Ordering::Relaxed),
            readers: self.counters.readers.load(Ordering::Relaxed),
        })
    }
}
