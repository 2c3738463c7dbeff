//! SQLite-backed storage areas.
//!
//! One database file holds both areas in a single `kv_store` table keyed by
//! `(area, key)`. Opening the database applies the WAL pragmas and runs any
//! pending table migrations.

use super::{Area, StorageArea, migrations};
use crate::Error;
use async_trait::async_trait;
use std::path::Path;
use tokio_rusqlite::rusqlite::OptionalExtension;
use tokio_rusqlite::{Connection, params};

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Key-value database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread.
#[derive(Clone, Debug)]
pub struct KvDb {
    pub(crate) conn: Connection,
}

impl KvDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }

    /// Storage area view over this database.
    pub fn area(&self, area: Area) -> SqliteArea {
        SqliteArea { db: self.clone(), area }
    }
}

/// One storage area inside a [`KvDb`].
#[derive(Clone, Debug)]
pub struct SqliteArea {
    db: KvDb,
    area: Area,
}

#[async_trait]
impl StorageArea for SqliteArea {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        let area = self.area.as_str();
        self.db
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let value = conn
                    .query_row(
                        "SELECT value FROM kv_store WHERE area = ?1 AND key = ?2",
                        params![area, key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await
            .map_err(Error::from)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Error> {
        let key = key.to_string();
        let area = self.area.as_str();
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv_store (area, key, value, updated_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(area, key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at",
                    params![area, key, value, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        let area = self.area.as_str();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM kv_store WHERE area = ?1 AND key = ?2", params![area, key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<u64, Error> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let area = self.area.as_str();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let mut removed = 0u64;
                for key in &keys {
                    removed +=
                        tx.execute("DELETE FROM kv_store WHERE area = ?1 AND key = ?2", params![area, key])? as u64;
                }
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let area = self.area.as_str();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM kv_store WHERE area = ?1 ORDER BY key")?;
                let keys = stmt
                    .query_map(params![area], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn clear(&self) -> Result<(), Error> {
        let area = self.area.as_str();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM kv_store WHERE area = ?1", params![area])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn bytes_in_use(&self) -> Result<u64, Error> {
        let area = self.area.as_str();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let bytes: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
                    FROM kv_store WHERE area = ?1",
                    params![area],
                    |row| row.get(0),
                )?;
                Ok(bytes as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = KvDb::open_in_memory().await.unwrap();
        let version = db
            .conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let db = KvDb::open_in_memory().await.unwrap();
        let local = db.area(Area::Local);

        local.set("tasks", "{}".to_string()).await.unwrap();
        assert_eq!(local.get("tasks").await.unwrap().as_deref(), Some("{}"));

        local.set("tasks", r#"{"a":1}"#.to_string()).await.unwrap();
        assert_eq!(local.get("tasks").await.unwrap().as_deref(), Some(r#"{"a":1}"#));

        assert!(local.remove("tasks").await.unwrap());
        assert!(!local.remove("tasks").await.unwrap());
        assert!(local.get("tasks").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_areas_are_isolated() {
        let db = KvDb::open_in_memory().await.unwrap();
        let local = db.area(Area::Local);
        let sync = db.area(Area::Sync);

        local.set("preferences", "local".to_string()).await.unwrap();
        sync.set("preferences", "sync".to_string()).await.unwrap();

        assert_eq!(local.get("preferences").await.unwrap().as_deref(), Some("local"));
        assert_eq!(sync.get("preferences").await.unwrap().as_deref(), Some("sync"));

        sync.clear().await.unwrap();
        assert!(sync.keys().await.unwrap().is_empty());
        assert_eq!(local.keys().await.unwrap(), vec!["preferences".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_many_and_bytes_in_use() {
        let db = KvDb::open_in_memory().await.unwrap();
        let local = db.area(Area::Local);
        assert_eq!(local.bytes_in_use().await.unwrap(), 0);

        local.set("a", "123".to_string()).await.unwrap();
        local.set("b", "45".to_string()).await.unwrap();
        assert_eq!(local.bytes_in_use().await.unwrap(), 7);

        let removed = local.remove_many(&["a", "b", "missing"]).await.unwrap();
        assert_eq!(removed, 2);
        assert!(local.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");

        {
            let db = KvDb::open(&path).await.unwrap();
            db.area(Area::Local).set("schema_version", "1".to_string()).await.unwrap();
        }

        let db = KvDb::open(&path).await.unwrap();
        let value = db.area(Area::Local).get("schema_version").await.unwrap();
        assert_eq!(value.as_deref(), Some("1"));
    }
}
