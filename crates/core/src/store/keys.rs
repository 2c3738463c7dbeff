//! Storage keys, one per top-level category.
//!
//! Preferences live in the sync area; everything else is local.

pub const TASKS: &str = "tasks";
pub const PATTERNS: &str = "patterns";
pub const PREFERENCES: &str = "preferences";
pub const RESPONSE_CACHE: &str = "response_cache";
pub const USAGE_STATS: &str = "usage_stats";
pub const SCHEMA_VERSION: &str = "schema_version";
pub const ENCRYPTION_KEY: &str = "encryption_key";

/// Data categories stored in the local area.
pub const LOCAL_DATA: &[&str] = &[TASKS, PATTERNS, RESPONSE_CACHE, USAGE_STATS];
