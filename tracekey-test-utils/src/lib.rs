//! Tracekey Test Utilities
//!
//! Shared test infrastructure for the Tracekey workspace:
//! - Proptest generators for Diagnosis Keys and upload batches
//! - Test fixtures for common scenarios
//! - Repository and cache doubles with switchable failures

pub use tracekey_core::{DiagnosisKey, Timestamp, TracekeyError, TracekeyResult};
pub use tracekey_storage::{InMemoryRepository, MemoryCache};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tracekey_core::{CacheError, RepositoryError};
use tracekey_storage::{CacheStats, DiagnosisKeyCache, DiagnosisKeyRepository, SnapshotReader};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Diagnosis Key types.

    use super::*;
    use proptest::prelude::*;
    use tracekey_core::TEMPORARY_EXPOSURE_KEY_SIZE;

    /// Generate a random Temporary Exposure Key.
    pub fn arb_temporary_exposure_key() -> impl Strategy<Value = [u8; TEMPORARY_EXPOSURE_KEY_SIZE]>
    {
        any::<[u8; TEMPORARY_EXPOSURE_KEY_SIZE]>()
    }

    /// Generate a Diagnosis Key without an upload time, as it appears on the
    /// wire.
    pub fn arb_diagnosis_key() -> impl Strategy<Value = DiagnosisKey> {
        (arb_temporary_exposure_key(), any::<u32>())
            .prop_map(|(tek, interval)| DiagnosisKey::new(tek, interval))
    }

    /// Generate a Timestamp within 2020-2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_default()
        })
    }

    /// Generate a non-empty upload batch of at most `max` keys.
    pub fn arb_batch(max: usize) -> impl Strategy<Value = Vec<DiagnosisKey>> {
        prop::collection::vec(arb_diagnosis_key(), 1..=max.max(1))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Read;

    /// A deterministic key distinguishable by `seed`.
    pub fn diagnosis_key(seed: u8) -> DiagnosisKey {
        let mut tek = [seed; 16];
        tek[0] = 0xA0;
        DiagnosisKey::new(tek, 2_650_000 + seed as u32)
    }

    /// `n` distinct keys.
    pub fn diagnosis_keys(n: u8) -> Vec<DiagnosisKey> {
        (0..n).map(diagnosis_key).collect()
    }

    /// Noon UTC on the given day of June 2020.
    pub fn june(day: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2020, 6, day, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Drain an export reader.
    pub fn read_all(mut reader: SnapshotReader) -> Vec<u8> {
        let mut out = Vec::new();
        reader
            .read_to_end(&mut out)
            .unwrap_or_else(|e| panic!("reading snapshot failed: {e}"));
        out
    }
}

// ============================================================================
// DOUBLES
// ============================================================================

/// Repository double over an [`InMemoryRepository`] whose reads and writes
/// can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyRepository {
    inner: InMemoryRepository,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    store_calls: AtomicU64,
    find_calls: AtomicU64,
}

impl FlakyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryRepository {
        &self.inner
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Calls to `store_diagnosis_keys`, failed ones included.
    pub fn store_calls(&self) -> u64 {
        self.store_calls.load(Ordering::SeqCst)
    }

    /// Calls to `find_all_diagnosis_keys`, failed ones included.
    pub fn find_calls(&self) -> u64 {
        self.find_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiagnosisKeyRepository for FlakyRepository {
    async fn store_diagnosis_keys(
        &self,
        keys: &[DiagnosisKey],
        created_at: Timestamp,
    ) -> TracekeyResult<()> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::StoreFailed {
                reason: "injected write failure".to_string(),
            }
            .into());
        }
        self.inner.store_diagnosis_keys(keys, created_at).await
    }

    async fn find_all_diagnosis_keys(&self) -> TracekeyResult<Vec<DiagnosisKey>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepositoryError::FetchFailed {
                reason: "injected read failure".to_string(),
            }
            .into());
        }
        self.inner.find_all_diagnosis_keys().await
    }

    async fn last_modified(&self) -> TracekeyResult<Timestamp> {
        self.inner.last_modified().await
    }
}

/// Cache double over a [`MemoryCache`] whose mutations can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyCache {
    inner: MemoryCache,
    fail_adds: AtomicBool,
    fail_sets: AtomicBool,
    failed_adds: AtomicU64,
}

impl FlakyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryCache {
        &self.inner
    }

    pub fn set_fail_adds(&self, fail: bool) {
        self.fail_adds.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    /// Adds rejected so far.
    pub fn failed_adds(&self) -> u64 {
        self.failed_adds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiagnosisKeyCache for FlakyCache {
    async fn set(&self, keys: &[DiagnosisKey], last_modified: Timestamp) -> TracekeyResult<()> {
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(CacheError::Backend {
                reason: "injected set failure".to_string(),
            }
            .into());
        }
        self.inner.set(keys, last_modified).await
    }

    async fn add(&self, keys: &[DiagnosisKey], uploaded_at: Timestamp) -> TracekeyResult<()> {
        if self.fail_adds.load(Ordering::SeqCst) {
            self.failed_adds.fetch_add(1, Ordering::SeqCst);
            return Err(CacheError::Backend {
                reason: "injected add failure".to_string(),
            }
            .into());
        }
        self.inner.add(keys, uploaded_at).await
    }

    async fn reader(&self, since: Option<Timestamp>) -> TracekeyResult<SnapshotReader> {
        self.inner.reader(since).await
    }

    async fn last_modified(&self) -> TracekeyResult<Timestamp> {
        self.inner.last_modified().await
    }

    async fn stats(&self) -> TracekeyResult<CacheStats> {
        self.inner.stats().await
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Tracekey error variants.

    use super::*;

    /// Assert that a TracekeyResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &TracekeyResult<T>) {
        match result {
            Err(TracekeyError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a TracekeyResult is a Repository error.
    #[track_caller]
    pub fn assert_repository_error<T: std::fmt::Debug>(result: &TracekeyResult<T>) {
        match result {
            Err(TracekeyError::Repository(_)) => {}
            other => panic!("Expected Repository error, got: {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flaky_repository_toggles() {
        let repo = FlakyRepository::new();
        let keys = fixtures::diagnosis_keys(2);

        repo.set_fail_writes(true);
        assert!(repo.store_diagnosis_keys(&keys, fixtures::june(1)).await.is_err());
        assert!(repo.inner().is_empty());

        repo.set_fail_writes(false);
        repo.store_diagnosis_keys(&keys, fixtures::june(1)).await.unwrap();
        assert_eq!(repo.inner().len(), 2);
        assert_eq!(repo.store_calls(), 2);

        repo.set_fail_reads(true);
        assertions::assert_repository_error(&repo.find_all_diagnosis_keys().await);
    }

    #[tokio::test]
    async fn test_flaky_cache_counts_failed_adds() {
        let cache = FlakyCache::new();
        cache.set_fail_adds(true);
        assert!(cache.add(&fixtures::diagnosis_keys(1), fixtures::june(1)).await.is_err());
        assert_eq!(cache.failed_adds(), 1);
        assert_eq!(cache.stats().await.unwrap().key_count, 0);
    }
}
