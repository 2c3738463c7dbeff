//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TABMATE_*)
//! 2. TOML config file (if TABMATE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TABMATE_*)
/// 2. TOML config file (if TABMATE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database backing both storage areas.
    ///
    /// Set via TABMATE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Whether stored values are wrapped in AES-256-GCM envelopes.
    ///
    /// Set via TABMATE_ENCRYPTION_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub encryption_enabled: bool,

    /// Maximum number of entries kept in the persistent response cache.
    ///
    /// Set via TABMATE_RESPONSE_CACHE_MAX_ENTRIES environment variable.
    #[serde(default = "default_response_cache_max_entries")]
    pub response_cache_max_entries: usize,

    /// Default lifetime of a persistent response cache entry, in seconds.
    ///
    /// Set via TABMATE_RESPONSE_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_response_cache_ttl_secs")]
    pub response_cache_ttl_secs: u64,

    /// Raw settings for the in-process runtime cache.
    ///
    /// Kept opaque here so the store does not depend on the cache crate;
    /// set via TABMATE_RUNTIME_CACHE__* environment variables.
    #[serde(default)]
    pub runtime_cache: Option<serde_json::Value>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tabmate.sqlite")
}

fn default_true() -> bool {
    true
}

fn default_response_cache_max_entries() -> usize {
    100
}

fn default_response_cache_ttl_secs() -> u64 {
    3600
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            encryption_enabled: true,
            response_cache_max_entries: default_response_cache_max_entries(),
            response_cache_ttl_secs: default_response_cache_ttl_secs(),
            runtime_cache: None,
        }
    }
}

impl AppConfig {
    /// Response TTL as Duration.
    pub fn response_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.response_cache_ttl_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TABMATE_`
    /// 2. TOML file from `TABMATE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TABMATE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TABMATE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
