//! Tracekey Service - Upload, Hydration and Export
//!
//! Wires a [`DiagnosisKeyRepository`](tracekey_storage::DiagnosisKeyRepository)
//! and a [`DiagnosisKeyCache`](tracekey_storage::DiagnosisKeyCache) together:
//! - Uploads are validated and written through to the repository
//! - The cache receives each accepted batch as an incremental append
//! - A background job re-hydrates the cache on a fixed interval
//! - Exports stream from the cache, optionally windowed by upload day

pub mod config;
pub mod constants;
pub mod hydrate;
pub mod jobs;
pub mod service;

pub use config::ServiceConfig;
pub use hydrate::Hydrator;
pub use jobs::{cache_refresh_task, RefreshMetrics, RefreshSnapshot};
pub use service::{Service, ServiceState};
