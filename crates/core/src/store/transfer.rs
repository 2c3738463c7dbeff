//! Whole-store export, import, reset and size reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patterns::PatternMap;
use super::preferences::UserPreferences;
use super::tasks::TaskMap;
use super::usage::UsageMap;
use super::{CURRENT_SCHEMA_VERSION, Store, keys};
use crate::Error;
use crate::storage::Area;

/// Portable snapshot of everything worth keeping.
///
/// The response cache and the encryption key are deliberately excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportData {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub tasks: TaskMap,
    #[serde(default)]
    pub patterns: PatternMap,
    #[serde(default)]
    pub preferences: UserPreferences,
    #[serde(default)]
    pub usage_stats: UsageMap,
}

/// What an import changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub tasks: usize,
    pub patterns: usize,
    pub usage_stats: usize,
    pub preferences_replaced: bool,
}

/// Storage footprint and record counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub local_bytes: u64,
    pub sync_bytes: u64,
    pub task_count: usize,
    pub pattern_count: usize,
    pub cached_response_count: usize,
    pub tracked_task_count: usize,
    pub schema_version: u32,
    pub encryption_enabled: bool,
}

impl ExportData {
    /// Validate every record before anything is written.
    fn validate(&self) -> Result<(), Error> {
        if self.version > CURRENT_SCHEMA_VERSION {
            return Err(Error::InvalidInput(format!(
                "export has schema version {}, newest supported is {CURRENT_SCHEMA_VERSION}",
                self.version
            )));
        }
        for (id, task) in &self.tasks {
            if id != &task.id {
                return Err(Error::InvalidInput(format!("task key {id} does not match record id {}", task.id)));
            }
            task.validate()?;
        }
        for (id, pattern) in &self.patterns {
            if id != &pattern.id {
                return Err(Error::InvalidInput(format!("pattern key {id} does not match record id {}", pattern.id)));
            }
            pattern.validate()?;
        }
        self.preferences.validate()
    }
}

impl Store {
    pub async fn export_all_data(&self) -> Result<ExportData, Error> {
        Ok(ExportData {
            version: CURRENT_SCHEMA_VERSION,
            exported_at: Utc::now(),
            tasks: self.get_all_tasks().await?,
            patterns: self.get_all_patterns().await?,
            preferences: self.get_preferences().await?,
            usage_stats: self.get_all_usage_stats().await?,
        })
    }

    /// Load an export.
    ///
    /// With `overwrite`, each category is replaced by the imported one.
    /// Otherwise imported records are merged over existing ones by id and
    /// the current preferences are kept. Nothing is written if any imported
    /// record fails validation.
    pub async fn import_all_data(&self, data: ExportData, overwrite: bool) -> Result<ImportSummary, Error> {
        data.validate()?;

        let summary = ImportSummary {
            tasks: data.tasks.len(),
            patterns: data.patterns.len(),
            usage_stats: data.usage_stats.len(),
            preferences_replaced: overwrite,
        };

        let (tasks, patterns, usage_stats) = if overwrite {
            (data.tasks, data.patterns, data.usage_stats)
        } else {
            let mut tasks = self.get_all_tasks().await?;
            tasks.extend(data.tasks);
            let mut patterns = self.get_all_patterns().await?;
            patterns.extend(data.patterns);
            let mut usage_stats = self.get_all_usage_stats().await?;
            usage_stats.extend(data.usage_stats);
            (tasks, patterns, usage_stats)
        };

        self.write(keys::TASKS, &tasks).await?;
        self.write(keys::PATTERNS, &patterns).await?;
        self.write(keys::USAGE_STATS, &usage_stats).await?;
        if overwrite {
            self.write(keys::PREFERENCES, &data.preferences).await?;
        }

        tracing::info!(
            tasks = summary.tasks,
            patterns = summary.patterns,
            usage_stats = summary.usage_stats,
            overwrite,
            "Imported data"
        );
        Ok(summary)
    }

    /// Wipe both areas and reseed defaults. The encryption key is kept.
    pub async fn clear_all_data(&self) -> Result<(), Error> {
        self.area(Area::Local).clear().await?;
        self.area(Area::Sync).clear().await?;

        self.persist_key().await?;
        self.set_schema_version(CURRENT_SCHEMA_VERSION).await?;
        self.ensure_defaults().await?;

        tracing::info!("Cleared all stored data");
        Ok(())
    }

    pub async fn get_storage_info(&self) -> Result<StorageInfo, Error> {
        Ok(StorageInfo {
            local_bytes: self.area(Area::Local).bytes_in_use().await?,
            sync_bytes: self.area(Area::Sync).bytes_in_use().await?,
            task_count: self.get_all_tasks().await?.len(),
            pattern_count: self.get_all_patterns().await?.len(),
            cached_response_count: self.response_cache_len().await?,
            tracked_task_count: self.get_all_usage_stats().await?.len(),
            schema_version: self.schema_version().await?,
            encryption_enabled: self.encryption_enabled(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::patterns::NewPattern;
    use crate::store::preferences::{PreferencesUpdate, Theme};
    use crate::store::tasks::tests::make_test_task;
    use crate::store::tests::{encrypted_settings, plain_settings};
    use std::time::Duration;

    async fn populated_store() -> Store {
        let store = Store::open_in_memory(encrypted_settings()).await.unwrap();
        let id = store.create_task(make_test_task("Summarize", &[r"github\.com"])).await.unwrap();
        store.create_task(make_test_task("Translate", &["docs"])).await.unwrap();
        store
            .create_pattern(NewPattern { pattern: r"arxiv\.org".into(), category: "research".into() })
            .await
            .unwrap();
        store
            .update_preferences(PreferencesUpdate { theme: Some(Theme::Dark), ..Default::default() })
            .await
            .unwrap();
        store.record_usage(&id, true, Duration::from_millis(80)).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let source = populated_store().await;
        let exported = source.export_all_data().await.unwrap();

        let target = Store::open_in_memory(plain_settings()).await.unwrap();
        let summary = target.import_all_data(exported.clone(), true).await.unwrap();
        assert_eq!(summary.tasks, 2);
        assert_eq!(summary.patterns, 1);

        let reexported = target.export_all_data().await.unwrap();
        assert_eq!(reexported.tasks, exported.tasks);
        assert_eq!(reexported.patterns, exported.patterns);
        assert_eq!(reexported.preferences, exported.preferences);
        assert_eq!(reexported.usage_stats, exported.usage_stats);
    }

    #[tokio::test]
    async fn test_export_survives_json() {
        let source = populated_store().await;
        let exported = source.export_all_data().await.unwrap();

        let json = serde_json::to_string(&exported).unwrap();
        let parsed: ExportData = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, exported);
    }

    #[tokio::test]
    async fn test_merge_import_keeps_existing() {
        let source = populated_store().await;
        let exported = source.export_all_data().await.unwrap();

        let target = Store::ephemeral(plain_settings()).await.unwrap();
        let existing = target.create_task(make_test_task("Local", &["local"])).await.unwrap();

        let summary = target.import_all_data(exported, false).await.unwrap();
        assert!(!summary.preferences_replaced);

        let tasks = target.get_all_tasks().await.unwrap();
        assert_eq!(tasks.len(), 3);
        assert!(tasks.contains_key(&existing));
        assert_eq!(target.get_preferences().await.unwrap().theme, Theme::Auto);
    }

    #[tokio::test]
    async fn test_invalid_import_writes_nothing() {
        let source = populated_store().await;
        let mut exported = source.export_all_data().await.unwrap();
        if let Some(task) = exported.tasks.values_mut().next() {
            task.website_patterns.push("(".into());
        }

        let target = Store::ephemeral(plain_settings()).await.unwrap();
        assert!(target.import_all_data(exported, true).await.is_err());
        assert!(target.get_all_tasks().await.unwrap().is_empty());
        assert!(target.get_all_patterns().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_rejects_newer_version() {
        let source = populated_store().await;
        let mut exported = source.export_all_data().await.unwrap();
        exported.version = CURRENT_SCHEMA_VERSION + 1;

        let target = Store::ephemeral(plain_settings()).await.unwrap();
        assert!(matches!(target.import_all_data(exported, true).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_clear_all_data_reseeds() {
        let store = populated_store().await;
        store.clear_all_data().await.unwrap();

        assert!(store.get_all_tasks().await.unwrap().is_empty());
        assert!(store.get_all_patterns().await.unwrap().is_empty());
        assert_eq!(store.get_preferences().await.unwrap(), UserPreferences::default());
        assert_eq!(store.schema_version().await.unwrap(), CURRENT_SCHEMA_VERSION);

        // key still usable after the wipe
        let id = store.create_task(make_test_task("After", &["x"])).await.unwrap();
        assert!(store.get_task(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_storage_info() {
        let store = populated_store().await;
        let info = store.get_storage_info().await.unwrap();

        assert_eq!(info.task_count, 2);
        assert_eq!(info.pattern_count, 1);
        assert_eq!(info.cached_response_count, 0);
        assert_eq!(info.tracked_task_count, 1);
        assert_eq!(info.schema_version, CURRENT_SCHEMA_VERSION);
        assert!(info.encryption_enabled);
        assert!(info.local_bytes > 0);
        assert!(info.sync_bytes > 0);
    }
}
