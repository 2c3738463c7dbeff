//! Persistent response cache.
//!
//! Cross-session cache of AI responses, bounded by entry count rather than
//! bytes. Entries expire by timestamp; expired entries are dropped on read
//! and swept before every write.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hash::compute_response_key;
use super::{Store, keys};
use crate::Error;

/// A cached response with its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hits: u64,
}

impl CachedResponse {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub type ResponseCacheMap = BTreeMap<String, CachedResponse>;

/// Drop expired entries. Returns how many were removed.
fn sweep_expired(cache: &mut ResponseCacheMap, now: DateTime<Utc>) -> usize {
    let before = cache.len();
    cache.retain(|_, entry| !entry.is_expired_at(now));
    before - cache.len()
}

/// Evict oldest entries until there is room for one more.
fn make_room(cache: &mut ResponseCacheMap, max_entries: usize) -> usize {
    let mut evicted = 0;
    while !cache.is_empty() && cache.len() >= max_entries {
        let oldest = cache
            .iter()
            .min_by_key(|(_, entry)| entry.created_at)
            .map(|(key, _)| key.clone());
        match oldest {
            Some(key) => {
                cache.remove(&key);
                evicted += 1;
            }
            None => break,
        }
    }
    evicted
}

impl Store {
    async fn response_cache(&self) -> Result<ResponseCacheMap, Error> {
        Ok(self.read(keys::RESPONSE_CACHE).await?.unwrap_or_default())
    }

    /// Cache `response` for the request. `ttl` defaults to the configured
    /// response TTL. Returns the request hash.
    pub async fn cache_response(
        &self, prompt: &str, context: &serde_json::Value, task_type: &str, response: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<String, Error> {
        let ttl = ttl.unwrap_or(self.settings.response_cache_ttl);
        let now = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| Error::InvalidInput("ttl out of range".into()))?;
        let key = compute_response_key(prompt, context, task_type);

        let mut cache = self.response_cache().await?;
        let expired = sweep_expired(&mut cache, now);
        let evicted = if cache.contains_key(&key) {
            0
        } else {
            make_room(&mut cache, self.settings.response_cache_max_entries)
        };

        cache.insert(key.clone(), CachedResponse { response, created_at: now, expires_at, hits: 0 });
        self.write(keys::RESPONSE_CACHE, &cache).await?;

        tracing::debug!(key = %key, expired, evicted, entries = cache.len(), "Cached response");
        Ok(key)
    }

    /// Cached response for the request, if present and fresh.
    pub async fn get_cached_response(
        &self, prompt: &str, context: &serde_json::Value, task_type: &str,
    ) -> Result<Option<serde_json::Value>, Error> {
        self.get_cached_response_by_key(&compute_response_key(prompt, context, task_type))
            .await
    }

    /// Cached response by request hash. Expired entries are removed.
    pub async fn get_cached_response_by_key(&self, key: &str) -> Result<Option<serde_json::Value>, Error> {
        let mut cache = self.response_cache().await?;
        let now = Utc::now();

        let Some(entry) = cache.get_mut(key) else {
            return Ok(None);
        };

        if entry.is_expired_at(now) {
            cache.remove(key);
            self.write(keys::RESPONSE_CACHE, &cache).await?;
            tracing::debug!(key, "Response cache entry expired");
            return Ok(None);
        }

        entry.hits += 1;
        let response = entry.response.clone();
        self.write(keys::RESPONSE_CACHE, &cache).await?;
        Ok(Some(response))
    }

    pub async fn clear_response_cache(&self) -> Result<(), Error> {
        self.write(keys::RESPONSE_CACHE, &ResponseCacheMap::new()).await
    }

    /// Remove every expired entry. Returns how many were removed.
    pub async fn purge_expired_responses(&self) -> Result<u64, Error> {
        let mut cache = self.response_cache().await?;
        let removed = sweep_expired(&mut cache, Utc::now());
        if removed > 0 {
            self.write(keys::RESPONSE_CACHE, &cache).await?;
        }
        Ok(removed as u64)
    }

    pub(crate) async fn response_cache_len(&self) -> Result<usize, Error> {
        Ok(self.response_cache().await?.len())
    }
}
