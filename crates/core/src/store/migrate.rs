//! Data schema migrations.
//!
//! The schema version marker lives in the local area as a plain integer.
//! Steps run in ascending order, each at most once; the marker advances
//! only after a step completes, so an interrupted migration is retried on
//! the next open. New steps are appended, never edited.

use super::{Store, keys};
use crate::Error;
use crate::storage::Area;

/// Version the running code reads and writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Migration list: (target version, description).
const MIGRATIONS: &[(u32, &str)] = &[(1, "drop data written in the pre-envelope format")];

/// Run every pending migration. Returns the resulting schema version.
pub(crate) async fn run(store: &Store) -> Result<u32, Error> {
    let current = store.schema_version().await?;

    if current > CURRENT_SCHEMA_VERSION {
        tracing::warn!(
            stored = current,
            supported = CURRENT_SCHEMA_VERSION,
            "Stored schema is newer than this build; leaving data untouched"
        );
        return Ok(current);
    }

    let mut version = current;
    for &(target, description) in MIGRATIONS {
        if target <= version {
            continue;
        }
        tracing::info!(from = version, to = target, description, "Applying data migration");
        apply(store, target)
            .await
            .map_err(|e| Error::MigrationFailed(format!("step to version {target}: {e}")))?;
        store.set_schema_version(target).await?;
        version = target;
    }

    Ok(version)
}

async fn apply(store: &Store, target: u32) -> Result<(), Error> {
    match target {
        1 => clear_legacy_data(store).await,
        other => Err(Error::MigrationFailed(format!("no migration step for version {other}"))),
    }
}

/// Version 1 changed the stored value format; older values cannot be read.
async fn clear_legacy_data(store: &Store) -> Result<(), Error> {
    let removed = store.area(Area::Local).remove_many(keys::LOCAL_DATA).await?
        + store.area(Area::Sync).remove_many(&[keys::PREFERENCES]).await?;
    tracing::info!(removed, "Cleared legacy data");
    Ok(())
}

impl Store {
    /// Stored schema version; 0 for a store that was never migrated.
    pub async fn schema_version(&self) -> Result<u32, Error> {
        let Some(raw) = self.area(Area::Local).get(keys::SCHEMA_VERSION).await? else {
            return Ok(0);
        };
        match raw.trim().parse() {
            Ok(version) => Ok(version),
            Err(e) => {
                tracing::warn!(raw, error = %e, "Unreadable schema version; treating store as unmigrated");
                Ok(0)
            }
        }
    }

    pub(crate) async fn set_schema_version(&self, version: u32) -> Result<(), Error> {
        self.area(Area::Local)
            .set(keys::SCHEMA_VERSION, version.to_string())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryArea, StorageArea};
    use crate::store::tests::plain_settings;
    use std::sync::Arc;

    #[test]
    fn test_migration_list_is_ordered() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(MIGRATIONS.last().map(|m| m.0), Some(CURRENT_SCHEMA_VERSION));
    }

    #[tokio::test]
    async fn test_fresh_store_is_current() {
        let store = Store::ephemeral(plain_settings()).await.unwrap();
        assert_eq!(store.schema_version().await.unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_version_zero_data_is_cleared() {
        let local = Arc::new(MemoryArea::new());
        let sync = Arc::new(MemoryArea::new());
        local.set(keys::TASKS, "legacy-ciphertext".to_string()).await.unwrap();
        sync.set(keys::PREFERENCES, "legacy-prefs".to_string()).await.unwrap();

        let store = Store::with_areas(local.clone(), sync.clone(), plain_settings()).await.unwrap();

        assert_eq!(store.get_all_tasks().await.unwrap().len(), 0);
        assert_ne!(local.get(keys::TASKS).await.unwrap().as_deref(), Some("legacy-ciphertext"));
        assert_ne!(sync.get(keys::PREFERENCES).await.unwrap().as_deref(), Some("legacy-prefs"));
        assert_eq!(local.get(keys::SCHEMA_VERSION).await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_applied_migrations_do_not_rerun() {
        let local = Arc::new(MemoryArea::new());
        let sync = Arc::new(MemoryArea::new());

        let store = Store::with_areas(local.clone(), sync.clone(), plain_settings()).await.unwrap();
        store.write(keys::TASKS, &serde_json::json!({"kept": true})).await.unwrap();
        drop(store);

        let reopened = Store::with_areas(local, sync, plain_settings()).await.unwrap();
        let tasks: Option<serde_json::Value> = reopened.read(keys::TASKS).await.unwrap();
        assert_eq!(tasks, Some(serde_json::json!({"kept": true})));
    }

    #[tokio::test]
    async fn test_newer_schema_left_alone() {
        let local = Arc::new(MemoryArea::new());
        local.set(keys::SCHEMA_VERSION, "99".to_string()).await.unwrap();
        local.set(keys::PATTERNS, r#"{"from":"future"}"#.to_string()).await.unwrap();

        let store = Store::with_areas(local.clone(), Arc::new(MemoryArea::new()), plain_settings())
            .await
            .unwrap();

        assert_eq!(store.schema_version().await.unwrap(), 99);
        assert_eq!(local.get(keys::PATTERNS).await.unwrap().as_deref(), Some(r#"{"from":"future"}"#));
    }
}
