//! Snapshot cache for the Diagnosis Key export path.
//!
//! The cache holds one serialized view of every known key plus a day index,
//! so that "all keys since day D" is a seek rather than a scan.
//!
//! # Snapshot Publication
//!
//! Live state is a single [`Snapshot`] behind an atomically swapped `Arc`.
//! Writers derive the next immutable snapshot and publish it in one step;
//! readers capture the current `Arc` once and read only from it. A reader
//! obtained before an append therefore keeps its length and content.
//!
//! # Example
//!
//! ```ignore
//! let cache = MemoryCache::new();
//! cache.add(&batch, Utc::now()).await?;
//!
//! // Everything uploaded today or later
//! let mut reader = cache.reader(Some(Utc::now())).await?;
//! let size = reader.seek(SeekFrom::End(0))?;
//! ```

pub mod memory;
pub mod reader;
pub mod snapshot;
pub mod traits;

pub use memory::{MemoryCache, MemoryCacheConfig};
pub use reader::SnapshotReader;
pub use snapshot::Snapshot;
pub use traits::{CacheStats, DiagnosisKeyCache};
