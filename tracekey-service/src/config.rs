//! Service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracekey_core::ConfigError;
use tracekey_storage::MemoryCacheConfig;

use crate::constants::{
    DEFAULT_CACHE_REFRESH_INTERVAL_SECS, DEFAULT_MAX_UPLOAD_BATCH_SIZE,
    ENV_CACHE_REFRESH_INTERVAL_SECS, ENV_MAX_UPLOAD_BATCH_SIZE,
};

/// Configuration for a [`Service`](crate::Service).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Maximum number of keys accepted per upload (default: 14)
    pub max_upload_batch_size: usize,

    /// How often the cache is re-hydrated from the repository
    /// (default: 5 minutes)
    pub refresh_interval: Duration,

    /// Configuration for the default in-memory cache. Ignored when a cache
    /// is injected.
    pub cache: MemoryCacheConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_upload_batch_size: DEFAULT_MAX_UPLOAD_BATCH_SIZE,
            refresh_interval: Duration::from_secs(DEFAULT_CACHE_REFRESH_INTERVAL_SECS),
            cache: MemoryCacheConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Create a new service config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create ServiceConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `TRACEKEY_MAX_UPLOAD_BATCH_SIZE`: Keys accepted per upload (default: 14)
    /// - `TRACEKEY_CACHE_REFRESH_INTERVAL_SECS`: Re-hydration interval (default: 300)
    /// - plus the cache variables read by [`MemoryCacheConfig::from_env`]
    pub fn from_env() -> Self {
        let max_upload_batch_size = std::env::var(ENV_MAX_UPLOAD_BATCH_SIZE)
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BATCH_SIZE);

        let refresh_interval = Duration::from_secs(
            std::env::var(ENV_CACHE_REFRESH_INTERVAL_SECS)
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u64| *n > 0)
                .unwrap_or(DEFAULT_CACHE_REFRESH_INTERVAL_SECS),
        );

        Self {
            max_upload_batch_size,
            refresh_interval,
            cache: MemoryCacheConfig::from_env(),
        }
    }

    /// Create a configuration for development/testing with a short refresh
    /// interval.
    pub fn development() -> Self {
        Self {
            refresh_interval: Duration::from_secs(10),
            ..Self::default()
        }
    }

    /// Set the maximum upload batch size.
    pub fn with_max_upload_batch_size(mut self, max: usize) -> Self {
        self.max_upload_batch_size = max;
        self
    }

    /// Set the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the default cache configuration.
    pub fn with_cache_config(mut self, cache: MemoryCacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Replace unset values with their defaults.
    ///
    /// A zero `max_upload_batch_size` counts as unset.
    pub fn with_defaults_for_unset(mut self) -> Self {
        if self.max_upload_batch_size == 0 {
            self.max_upload_batch_size = DEFAULT_MAX_UPLOAD_BATCH_SIZE;
        }
        self
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_upload_batch_size".to_string(),
                value: "0".to_string(),
                reason: "must accept at least one key".to_string(),
            });
        }
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval".to_string(),
                value: format!("{:?}", self.refresh_interval),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ServiceConfig::default();
        assert_eq!(config.max_upload_batch_size, DEFAULT_MAX_UPLOAD_BATCH_SIZE);
        assert_eq!(
            config.refresh_interval,
            Duration::from_secs(DEFAULT_CACHE_REFRESH_INTERVAL_SECS)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_development() {
        let config = ServiceConfig::development();
        assert_eq!(config.refresh_interval, Duration::from_secs(10));
        assert_eq!(config.max_upload_batch_size, 14);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Without environment variables set, should use defaults
        let config = ServiceConfig::from_env();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_config_builder() {
        let config = ServiceConfig::new()
            .with_max_upload_batch_size(100)
            .with_refresh_interval(Duration::from_millis(250))
            .with_cache_config(MemoryCacheConfig::new().with_max_segments(4));
        assert_eq!(config.max_upload_batch_size, 100);
        assert_eq!(config.refresh_interval, Duration::from_millis(250));
        assert_eq!(config.cache.max_segments, 4);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let no_keys = ServiceConfig::new().with_max_upload_batch_size(0);
        assert!(matches!(
            no_keys.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "max_upload_batch_size"
        ));

        let no_interval = ServiceConfig::new().with_refresh_interval(Duration::ZERO);
        assert!(no_interval.validate().is_err());
    }

    #[test]
    fn test_zero_batch_size_is_unset() {
        let config = ServiceConfig::new()
            .with_max_upload_batch_size(0)
            .with_defaults_for_unset();
        assert_eq!(config.max_upload_batch_size, DEFAULT_MAX_UPLOAD_BATCH_SIZE);
        assert!(config.validate().is_ok());

        let explicit = ServiceConfig::new()
            .with_max_upload_batch_size(3)
            .with_defaults_for_unset();
        assert_eq!(explicit.max_upload_batch_size, 3);
    }
}
