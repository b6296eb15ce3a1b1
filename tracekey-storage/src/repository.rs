//! Durable source of truth for Diagnosis Keys.
//!
//! The cache is rebuilt from the repository, never the reverse. Any
//! persistent engine can sit behind [`DiagnosisKeyRepository`]; it is
//! expected to be safe for concurrent use on its own.

use std::sync::RwLock;

use async_trait::async_trait;
use tracekey_core::{DiagnosisKey, RepositoryError, Timestamp, TracekeyResult};

/// Repository trait for storing and retrieving Diagnosis Keys.
#[async_trait]
pub trait DiagnosisKeyRepository: Send + Sync {
    /// Persist a batch, stamping every key with `created_at`.
    async fn store_diagnosis_keys(
        &self,
        keys: &[DiagnosisKey],
        created_at: Timestamp,
    ) -> TracekeyResult<()>;

    /// Fetch every stored key with its upload time.
    async fn find_all_diagnosis_keys(&self) -> TracekeyResult<Vec<DiagnosisKey>>;

    /// Time of the latest upload.
    ///
    /// Returns [`RepositoryError::NoDiagnosisKeys`] when nothing has been
    /// stored yet.
    async fn last_modified(&self) -> TracekeyResult<Timestamp>;
}

// ============================================================================
// IN-MEMORY REPOSITORY
// ============================================================================

/// In-memory repository for testing and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    keys: RwLock<Vec<DiagnosisKey>>,
}

impl InMemoryRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository pre-populated with already-stamped keys.
    pub fn with_keys(keys: Vec<DiagnosisKey>) -> Self {
        Self {
            keys: RwLock::new(keys),
        }
    }

    /// Get count of stored keys.
    pub fn len(&self) -> usize {
        self.keys.read().map(|keys| keys.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all stored data.
    pub fn clear(&self) -> TracekeyResult<()> {
        self.keys
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?
            .clear();
        Ok(())
    }
}

#[async_trait]
impl DiagnosisKeyRepository for InMemoryRepository {
    async fn store_diagnosis_keys(
        &self,
        keys: &[DiagnosisKey],
        created_at: Timestamp,
    ) -> TracekeyResult<()> {
        let mut stored = self.keys.write().map_err(|_| RepositoryError::LockPoisoned)?;
        stored.extend(keys.iter().map(|key| key.with_uploaded_at(created_at)));
        Ok(())
    }

    async fn find_all_diagnosis_keys(&self) -> TracekeyResult<Vec<DiagnosisKey>> {
        let stored = self.keys.read().map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(stored.clone())
    }

    async fn last_modified(&self) -> TracekeyResult<Timestamp> {
        let stored = self.keys.read().map_err(|_| RepositoryError::LockPoisoned)?;
        stored
            .iter()
            .filter_map(|key| key.uploaded_at)
            .max()
            .ok_or_else(|| RepositoryError::NoDiagnosisKeys.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_empty_repository_reports_no_keys() {
        let repo = InMemoryRepository::new();
        let err = repo.last_modified().await.unwrap_err();
        assert!(err.is_no_diagnosis_keys());
        assert!(repo.find_all_diagnosis_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_stamps_upload_time() {
        let repo = InMemoryRepository::new();
        let t1 = Utc.with_ymd_and_hms(2020, 6, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2020, 6, 2, 10, 0, 0).unwrap();

        repo.store_diagnosis_keys(&[DiagnosisKey::new([1; 16], 1)], t1)
            .await
            .unwrap();
        repo.store_diagnosis_keys(
            &[DiagnosisKey::new([2; 16], 2), DiagnosisKey::new([3; 16], 3)],
            t2,
        )
        .await
        .unwrap();

        let keys = repo.find_all_diagnosis_keys().await.unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0].uploaded_at, Some(t1));
        assert_eq!(keys[2].uploaded_at, Some(t2));
        assert_eq!(repo.last_modified().await.unwrap(), t2);
    }

    #[tokio::test]
    async fn test_clear() {
        let repo = InMemoryRepository::new();
        repo.store_diagnosis_keys(&[DiagnosisKey::new([1; 16], 1)], Utc::now())
            .await
            .unwrap();
        assert_eq!(repo.len(), 1);
        repo.clear().unwrap();
        assert!(repo.is_empty());
    }
}
