//! Rebuilding the cache wholesale from the repository.

use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use tracekey_core::{CacheError, TracekeyResult};
use tracekey_storage::{DiagnosisKeyCache, DiagnosisKeyRepository};

/// Copies the repository's full key set into the cache.
pub struct Hydrator {
    repository: Arc<dyn DiagnosisKeyRepository>,
    cache: Arc<dyn DiagnosisKeyCache>,
}

impl Hydrator {
    pub fn new(
        repository: Arc<dyn DiagnosisKeyRepository>,
        cache: Arc<dyn DiagnosisKeyCache>,
    ) -> Self {
        Self { repository, cache }
    }

    /// Replace the cache snapshot with the repository contents.
    ///
    /// An empty repository leaves the cache as it is. Returns the resulting
    /// cache size in bytes.
    pub async fn hydrate(&self) -> TracekeyResult<u64> {
        let keys = self.repository.find_all_diagnosis_keys().await?;

        let last_modified = match self.repository.last_modified().await {
            Ok(ts) => ts,
            Err(e) if e.is_no_diagnosis_keys() => {
                tracing::debug!("Repository holds no diagnosis keys yet");
                return self.cache_size().await;
            }
            Err(e) => return Err(e),
        };

        self.cache.set(&keys, last_modified).await?;
        self.cache_size().await
    }

    /// Size of the full export, measured by seeking a reader to its end.
    pub async fn cache_size(&self) -> TracekeyResult<u64> {
        let mut reader = self.cache.reader(None).await?;
        let size = reader
            .seek(SeekFrom::End(0))
            .map_err(|e| CacheError::Seek {
                reason: e.to_string(),
            })?;
        Ok(size)
    }
}
