//! Cache capability trait and usage statistics.
//!
//! The service only talks to the cache through [`DiagnosisKeyCache`], so a
//! deployment can swap the in-memory default for an externally backed one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracekey_core::{DiagnosisKey, Timestamp, TracekeyResult};

use super::reader::SnapshotReader;

/// Serialized, day-windowed view of every known Diagnosis Key.
///
/// # Consistency Requirements
///
/// - `set` and `add` are atomic with respect to readers: a reader sees the
///   buffer from before or after a write, never a mix.
/// - Writers serialize with each other and with the hand-out of a reader.
/// - A [`SnapshotReader`] never blocks on, or observes, later writes.
#[async_trait]
pub trait DiagnosisKeyCache: Send + Sync {
    /// Replace the whole snapshot with `keys`, recording `last_modified` as
    /// the freshness timestamp.
    async fn set(&self, keys: &[DiagnosisKey], last_modified: Timestamp) -> TracekeyResult<()>;

    /// Append a freshly uploaded batch.
    ///
    /// Bumps the freshness timestamp to `uploaded_at` if it is later.
    async fn add(&self, keys: &[DiagnosisKey], uploaded_at: Timestamp) -> TracekeyResult<()>;

    /// A view of the current snapshot.
    ///
    /// `None` covers the full set. `Some(since)` starts at the first indexed
    /// day on or after the day `since` falls on, and is empty when every
    /// indexed day is earlier.
    ///
    /// The window is a superset: every key uploaded on or after that day is
    /// included, but a key appended out of order (an `add` for an earlier day
    /// after a later day was indexed) also shows up until the next `set`.
    async fn reader(&self, since: Option<Timestamp>) -> TracekeyResult<SnapshotReader>;

    /// Freshness timestamp of the current snapshot, the Unix epoch if the
    /// cache was never populated.
    async fn last_modified(&self) -> TracekeyResult<Timestamp>;

    /// Get cache statistics.
    async fn stats(&self) -> TracekeyResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of keys in the current snapshot.
    pub key_count: u64,
    /// Encoded size of the current snapshot.
    pub size_bytes: u64,
    /// Buffers backing the current snapshot.
    pub segment_count: u64,
    /// Entries in the day index.
    pub indexed_days: u64,
    /// Full replacements since startup.
    pub sets: u64,
    /// Appends since startup.
    pub adds: u64,
    /// Readers handed out since startup.
    pub readers: u64,
}

impl CacheStats {
    /// Mean number of appends between two full replacements.
    pub fn adds_per_set(&self) -> f64 {
        if self.sets == 0 {
            self.adds as f64
        } else {
            self.adds as f64 / self.sets as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adds_per_set() {
        let stats = CacheStats {
            sets: 4,
            adds: 10,
            ..Default::default()
        };
        assert!((stats.adds_per_set() - 2.5).abs() < 0.001);

        let never_set = CacheStats {
            adds: 3,
            ..Default::default()
        };
        assert!((never_set.adds_per_set() - 3.0).abs() < 0.001);
    }
}
