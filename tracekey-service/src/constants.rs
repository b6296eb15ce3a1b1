//! Service defaults and environment variable names.

use std::time::Duration;

/// Keys accepted per upload when not configured.
pub const DEFAULT_MAX_UPLOAD_BATCH_SIZE: usize = 14;

/// Seconds between full cache re-hydrations.
pub const DEFAULT_CACHE_REFRESH_INTERVAL_SECS: u64 = 300;

pub const ENV_MAX_UPLOAD_BATCH_SIZE: &str = "TRACEKEY_MAX_UPLOAD_BATCH_SIZE";
pub const ENV_CACHE_REFRESH_INTERVAL_SECS: &str = "TRACEKEY_CACHE_REFRESH_INTERVAL_SECS";

/// Shortest refresh interval the refresh job will run with.
pub const MIN_CACHE_REFRESH_INTERVAL: Duration = Duration::from_millis(1);
