//! Key-value storage areas backing the durable store.
//!
//! The store sees storage as two string-keyed areas: a private `local` area
//! and a `sync` area shared across installations. Both are reached through
//! the [`StorageArea`] trait so the store logic does not care whether values
//! land in SQLite or in memory.
//!
//! - [`SqliteArea`]: both areas in one SQLite database, with WAL mode and
//!   versioned table migrations
//! - [`MemoryArea`]: a process-local map, for tests and throwaway stores

pub mod connection;
pub mod memory;
pub mod migrations;

use std::fmt;

use async_trait::async_trait;

pub use crate::Error;

pub use connection::{KvDb, SqliteArea};
pub use memory::MemoryArea;

/// Which storage area a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    /// Private to this installation.
    Local,
    /// Synchronized across the user's installations.
    Sync,
}

impl Area {
    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Local => "local",
            Area::Sync => "sync",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asynchronous string key-value storage.
///
/// Values are opaque strings; serialization and encryption happen above this
/// layer. Implementations must tolerate concurrent callers but provide no
/// cross-call atomicity.
#[async_trait]
pub trait StorageArea: Send + Sync {
    /// Fetch the raw value under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), Error>;

    /// Remove `key`. Returns whether it existed.
    async fn remove(&self, key: &str) -> Result<bool, Error>;

    /// Remove every listed key. Returns how many existed.
    async fn remove_many(&self, keys: &[&str]) -> Result<u64, Error> {
        let mut removed = 0;
        for key in keys {
            if self.remove(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// List every key currently stored in this area.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Remove everything in this area.
    async fn clear(&self) -> Result<(), Error>;

    /// Approximate bytes used by keys and values.
    async fn bytes_in_use(&self) -> Result<u64, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_names() {
        assert_eq!(Area::Local.as_str(), "local");
        assert_eq!(Area::Sync.to_string(), "sync");
    }
}
