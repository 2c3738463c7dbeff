//! Durable data layer for tabmate.
//!
//! This crate provides:
//! - Key-value storage areas with a SQLite backend
//! - AES-256-GCM encryption at rest
//! - Versioned data migrations
//! - Task, pattern, preference, response cache and usage stat records
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod crypto;
pub mod error;
pub mod storage;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use store::patterns::{NewPattern, Pattern, PatternMap, PatternUpdate};
pub use store::preferences::{
    AiProvider, AiSettings, AutomationPermissions, PreferencesUpdate, PrivacySettings, SecurityLevel, Theme,
    UserPreferences,
};
pub use store::response_cache::CachedResponse;
pub use store::tasks::{NewTask, OutputFormat, Task, TaskMap, TaskUpdate};
pub use store::transfer::{ExportData, ImportSummary, StorageInfo};
pub use store::usage::{UsageMap, UsageMetrics};
pub use store::{CURRENT_SCHEMA_VERSION, Store, StoreSettings};
