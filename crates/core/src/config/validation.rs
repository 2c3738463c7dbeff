//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `db_path` is empty
    /// - `response_cache_max_entries` is 0 or exceeds 10,000
    /// - `response_cache_ttl_secs` is 0 or exceeds 30 days
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { field: "db_path".into(), reason: "must not be empty".into() });
        }

        if self.response_cache_max_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "response_cache_max_entries".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.response_cache_max_entries > 10_000 {
            return Err(ConfigError::Invalid {
                field: "response_cache_max_entries".into(),
                reason: "must not exceed 10000".into(),
            });
        }

        if self.response_cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "response_cache_ttl_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.response_cache_ttl_secs > 30 * 24 * 60 * 60 {
            return Err(ConfigError::Invalid {
                field: "response_cache_ttl_secs".into(),
                reason: "must not exceed 30 days".into(),
            });
        }

        if !self.encryption_enabled {
            tracing::warn!(db_path = %self.db_path.display(), "Encryption at rest is disabled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_db_path() {
        let config = AppConfig { db_path: PathBuf::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "db_path"));
    }

    #[test]
    fn test_validate_max_entries_zero() {
        let config = AppConfig { response_cache_max_entries: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "response_cache_max_entries"));
    }

    #[test]
    fn test_validate_max_entries_exceeds_limit() {
        let config = AppConfig { response_cache_max_entries: 10_001, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "response_cache_max_entries"));
    }

    #[test]
    fn test_validate_ttl_zero() {
        let config = AppConfig { response_cache_ttl_secs: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "response_cache_ttl_secs"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig {
            response_cache_max_entries: 10_000,
            response_cache_ttl_secs: 30 * 24 * 60 * 60,
            encryption_enabled: false,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
