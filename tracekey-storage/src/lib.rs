//! Tracekey Storage - Repository and Cache Traits
//!
//! Defines the durable repository and cache abstractions the service
//! orchestrates, with the default in-memory implementations of both.

pub mod cache;
pub mod constants;
pub mod repository;

pub use cache::{
    CacheStats, DiagnosisKeyCache, MemoryCache, MemoryCacheConfig, Snapshot, SnapshotReader,
};
pub use repository::{DiagnosisKeyRepository, InMemoryRepository};
