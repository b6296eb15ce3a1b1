//! Defaults and environment variable names for the storage layer.

/// Appended segments kept before a snapshot is coalesced into one buffer.
pub const DEFAULT_CACHE_MAX_SEGMENTS: usize = 64;

/// Environment variable overriding [`DEFAULT_CACHE_MAX_SEGMENTS`].
pub const ENV_CACHE_MAX_SEGMENTS: &str = "TRACEKEY_CACHE_MAX_SEGMENTS";

/// Environment variable holding the day boundary offset, in seconds east of UTC.
pub const ENV_DAY_BOUNDARY_OFFSET_SECS: &str = "TRACEKEY_DAY_BOUNDARY_OFFSET_SECS";
