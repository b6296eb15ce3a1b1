//! Background Jobs for the Tracekey service
//!
//! - `cache_refresh`: Periodically re-hydrates the cache from the repository
//!
//! # Usage
//!
//! [`Service::start`](crate::Service::start) spawns the refresh job after the
//! initial hydration and owns its shutdown signal:
//!
//! ```ignore
//! let service = Service::start(repository, None, ServiceConfig::from_env()).await?;
//!
//! // On shutdown
//! service.shutdown().await;
//! ```

pub mod cache_refresh;

// Re-export commonly used types
pub use cache_refresh::{cache_refresh_task, RefreshMetrics, RefreshSnapshot};
