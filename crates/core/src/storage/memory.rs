//! In-memory storage area.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::StorageArea;
use crate::Error;

/// Process-local storage area.
///
/// Uses a simple HashMap with tokio RwLock for concurrent access. Clones
/// share the same map.
#[derive(Clone, Default, Debug)]
pub struct MemoryArea {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryArea {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageArea for MemoryArea {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Error> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        Ok(self.values.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let mut keys: Vec<String> = self.values.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> Result<(), Error> {
        self.values.write().await.clear();
        Ok(())
    }

    async fn bytes_in_use(&self) -> Result<u64, Error> {
        let values = self.values.read().await;
        Ok(values.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum())
    }
}
