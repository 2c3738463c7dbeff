//! Runtime cache configuration.
//!
//! Deserializable so it can be embedded in the application's layered config
//! (the `runtime_cache` table); every field has a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eviction::EvictionStrategy;

const MAX_DEFAULT_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const MAX_CLEANUP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum CacheConfigError {
    #[error("invalid runtime cache configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on the summed size of all entries.
    pub max_size_bytes: usize,

    /// Lifetime of entries set without an explicit TTL.
    pub default_ttl_secs: u64,

    /// Period of the background expiry sweep.
    pub cleanup_interval_secs: u64,

    pub compression_enabled: bool,

    /// Payloads at or below this many bytes are never compressed.
    pub compression_threshold_bytes: usize,

    /// Record the per-operation performance log.
    pub metrics_enabled: bool,

    pub eviction_strategy: EvictionStrategy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 50 * 1024 * 1024,
            default_ttl_secs: 60 * 60,
            cleanup_interval_secs: 5 * 60,
            compression_enabled: true,
            compression_threshold_bytes: 1024,
            metrics_enabled: true,
            eviction_strategy: EvictionStrategy::Lru,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Build from the opaque `runtime_cache` config value, if any.
    pub fn from_value(value: Option<serde_json::Value>) -> Result<Self, CacheConfigError> {
        let config = match value {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| CacheConfigError::Invalid { field: "runtime_cache".into(), reason: e.to_string() })?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `CacheConfigError::Invalid` if:
    /// - `max_size_bytes` is 0
    /// - `default_ttl_secs` is 0 or exceeds 30 days
    /// - `cleanup_interval_secs` is 0 or exceeds 1 day
    pub fn validate(&self) -> Result<(), CacheConfigError> {
        if self.max_size_bytes == 0 {
            return Err(CacheConfigError::Invalid {
                field: "max_size_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.default_ttl_secs == 0 {
            return Err(CacheConfigError::Invalid {
                field: "default_ttl_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.default_ttl_secs > MAX_DEFAULT_TTL_SECS {
            return Err(CacheConfigError::Invalid {
                field: "default_ttl_secs".into(),
                reason: "must not exceed 30 days".into(),
            });
        }
        if self.cleanup_interval_secs == 0 {
            return Err(CacheConfigError::Invalid {
                field: "cleanup_interval_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.cleanup_interval_secs > MAX_CLEANUP_INTERVAL_SECS {
            return Err(CacheConfigError::Invalid {
                field: "cleanup_interval_secs".into(),
                reason: "must not exceed 1 day".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_size_bytes, 52_428_800);
        assert_eq!(config.default_ttl(), Duration::from_secs(3600));
        assert_eq!(config.cleanup_interval(), Duration::from_secs(300));
        assert!(config.compression_enabled);
        assert!(config.metrics_enabled);
        assert_eq!(config.eviction_strategy, EvictionStrategy::Lru);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_partial_value() {
        let config = CacheConfig::from_value(Some(json!({"eviction_strategy": "lfu", "max_size_bytes": 4096})))
            .unwrap();
        assert_eq!(config.eviction_strategy, EvictionStrategy::Lfu);
        assert_eq!(config.max_size_bytes, 4096);
        assert_eq!(config.default_ttl_secs, 3600);
    }

    #[test]
    fn test_from_none_is_default() {
        assert_eq!(CacheConfig::from_value(None).unwrap(), CacheConfig::default());
    }

    #[test]
    fn test_validate_zero_size() {
        let config = CacheConfig { max_size_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(CacheConfigError::Invalid { field, .. }) if field == "max_size_bytes"));
    }

    #[test]
    fn test_validate_zero_interval() {
        let config = CacheConfig { cleanup_interval_secs: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(CacheConfigError::Invalid { field, .. }) if field == "cleanup_interval_secs"));
    }

    #[test]
    fn test_validate_huge_ttl() {
        let config = CacheConfig { default_ttl_secs: u64::MAX, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(CacheConfigError::Invalid { field, .. }) if field == "default_ttl_secs"));
    }

    #[test]
    fn test_validate_huge_interval() {
        let config = CacheConfig { cleanup_interval_secs: u64::MAX, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(CacheConfigError::Invalid { field, .. }) if field == "cleanup_interval_secs"));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result = CacheConfig::from_value(Some(json!({"eviction_strategy": "random"})));
        assert!(result.is_err());
    }
}
