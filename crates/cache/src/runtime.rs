//! The in-process cache.
//!
//! All state sits behind one [`tokio::sync::Mutex`]. The optional background
//! sweeper holds only a weak reference to it and exits once the cache is gone.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::entry::{CacheEntry, Payload, deadline};
use crate::key::{self, CacheRequest, KeyOptions};
use crate::metrics::{CacheMetrics, Operation, PerformanceLog, PerformanceSample};

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    total_size: usize,
    tick: u64,
    metrics: CacheMetrics,
    log: PerformanceLog,
    metrics_enabled: bool,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.total_size -= entry.size;
        Some(entry)
    }

    fn remove_where(&mut self, mut predicate: impl FnMut(&str) -> bool) -> usize {
        let doomed: Vec<String> = self.entries.keys().filter(|k| predicate(k)).cloned().collect();
        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }

    fn sweep_expired(&mut self, now: Instant) -> usize {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            self.remove(key);
        }
        self.metrics.expirations += doomed.len() as u64;
        doomed.len()
    }

    /// Decode the live entry under `key`, updating its access metadata. An
    /// entry that no longer decodes is dropped.
    fn take_hit<T: DeserializeOwned>(&mut self, key: &str, now: Instant) -> Option<T> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        let decoded = entry.payload.decode().and_then(|raw| match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Cached value does not decode as the requested type");
                None
            }
        });

        if decoded.is_some() {
            entry.hits += 1;
            entry.last_accessed = now;
            entry.touched = tick;
        } else {
            self.remove(key);
        }
        decoded
    }

    fn record(&mut self, operation: Operation, key: Option<&str>, started: Instant, hit: Option<bool>) {
        if self.metrics_enabled {
            self.log.push(PerformanceSample {
                operation,
                key: key.map(str::to_string),
                duration: started.elapsed(),
                hit,
            });
        }
    }

    fn sweep(&mut self) -> usize {
        let started = Instant::now();
        let removed = self.sweep_expired(started);
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Swept expired cache entries");
        }
        self.record(Operation::Sweep, None, started, None);
        removed
    }
}

/// Size-bounded, expiring in-memory cache of serialized values.
#[derive(Debug)]
pub struct RuntimeCache {
    state: Arc<Mutex<CacheState>>,
    config: CacheConfig,
    sweeper: Option<JoinHandle<()>>,
}

impl RuntimeCache {
    /// Create a cache without a background sweeper. Expired entries are still
    /// dropped lazily on access, on admission pressure, or by [`Self::sweep`].
    pub fn new(config: CacheConfig) -> Self {
        let state = CacheState { metrics_enabled: config.metrics_enabled, ..Default::default() };
        tracing::info!(
            max_size_bytes = config.max_size_bytes,
            strategy = %config.eviction_strategy,
            compression = config.compression_enabled,
            "Runtime cache initialized"
        );
        Self { state: Arc::new(Mutex::new(state)), config, sweeper: None }
    }

    /// Create a cache and spawn its sweeper on the current Tokio runtime.
    pub fn start(config: CacheConfig) -> Self {
        let mut cache = Self::new(config);
        let period = cache.config.cleanup_interval();
        cache.sweeper = Some(tokio::spawn(run_sweeper(Arc::downgrade(&cache.state), period)));
        cache
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Derive a key for `request`. See [`crate::key`].
    pub fn generate_request_key(request: &CacheRequest, options: KeyOptions) -> String {
        key::generate_request_key(request, options)
    }

    /// Store `value` under `key` for `ttl` (or the configured default).
    ///
    /// Returns false when the value cannot be serialized or is larger than the
    /// whole budget; in the latter case any previous value under `key` is
    /// dropped as well.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let started = Instant::now();
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize cache value");
                return false;
            }
        };
        let payload =
            Payload::encode(raw, self.config.compression_enabled, self.config.compression_threshold_bytes);
        let size = key.len() + payload.len();
        let max = self.config.max_size_bytes;

        let mut state = self.state.lock().await;
        state.remove(key);

        if size > max {
            state.metrics.rejected += 1;
            tracing::warn!(key, size, max, "Cache entry larger than the whole budget; not admitted");
            state.record(Operation::Set, Some(key), started, None);
            return false;
        }

        if state.total_size + size > max {
            state.sweep_expired(started);
        }
        if state.total_size + size > max {
            for victim in self.config.eviction_strategy.victim_order(&state.entries) {
                if state.total_size + size <= max {
                    break;
                }
                if let Some(evicted) = state.remove(&victim) {
                    state.metrics.evictions += 1;
                    tracing::debug!(
                        key = %victim,
                        age = ?evicted.created_at.elapsed(),
                        strategy = %self.config.eviction_strategy,
                        "Evicted cache entry"
                    );
                }
            }
        }

        let tick = state.next_tick();
        let entry = CacheEntry {
            payload,
            created_at: started,
            expires_at: deadline(started, ttl.unwrap_or_else(|| self.config.default_ttl())),
            last_accessed: started,
            hits: 0,
            size,
            inserted: tick,
            touched: tick,
        };
        state.entries.insert(key.to_string(), entry);
        state.total_size += size;
        state.metrics.sets += 1;
        state.record(Operation::Set, Some(key), started, None);
        true
    }

    /// Fetch and decode the value under `key`. Expired or undecodable entries
    /// are removed and count as misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let started = Instant::now();
        let mut state = self.state.lock().await;

        let live = match state.entries.get(key).map(|entry| entry.is_expired_at(started)) {
            None => false,
            Some(true) => {
                state.remove(key);
                state.metrics.expirations += 1;
                false
            }
            Some(false) => true,
        };

        let value = if live { state.take_hit(key, started) } else { None };

        match value {
            Some(_) => {
                state.metrics.record_hit();
                tracing::debug!(key, "Runtime cache hit");
            }
            None => {
                state.metrics.record_miss();
                tracing::debug!(key, "Runtime cache miss");
            }
        }
        state.record(Operation::Get, Some(key), started, Some(value.is_some()));
        value
    }

    /// Remove every entry whose key matches `pattern`.
    pub async fn invalidate_by_pattern(&self, pattern: &Regex) -> usize {
        let removed = self.state.lock().await.remove_where(|key| pattern.is_match(key));
        tracing::debug!(pattern = %pattern, removed, "Invalidated cache entries");
        removed
    }

    /// Remove every entry keyed under `domain`.
    pub async fn invalidate_domain(&self, domain: &str) -> usize {
        let prefix = key::domain_prefix(domain);
        let removed = self.state.lock().await.remove_where(|key| key.starts_with(&prefix));
        tracing::debug!(domain, removed, "Invalidated domain cache entries");
        removed
    }

    /// Insert a batch of entries; returns how many were admitted.
    pub async fn preload<T, I>(&self, entries: I) -> usize
    where
        T: Serialize,
        I: IntoIterator<Item = (String, T, Option<Duration>)>,
    {
        let mut admitted = 0;
        for (key, value, ttl) in entries {
            if self.set(&key, &value, ttl).await {
                admitted += 1;
            }
        }
        tracing::info!(admitted, "Preloaded runtime cache");
        admitted
    }

    pub async fn get_metrics(&self) -> CacheMetrics {
        let state = self.state.lock().await;
        let mut metrics = state.metrics.clone();
        metrics.total_entries = state.entries.len();
        metrics.total_size = state.total_size;
        metrics.compressed_entries = state.entries.values().filter(|e| e.payload.is_compressed()).count() as u64;
        metrics
    }

    /// Recent operation timings, oldest first. Empty when metrics are disabled.
    pub async fn get_performance_log(&self) -> Vec<PerformanceSample> {
        self.state.lock().await.log.snapshot()
    }

    /// Drop every entry and reset counters and the performance log.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.total_size = 0;
        state.metrics = CacheMetrics::default();
        state.log.clear();
        tracing::debug!("Runtime cache cleared");
    }

    /// Remove expired entries now; returns how many were removed.
    pub async fn sweep(&self) -> usize {
        self.state.lock().await.sweep()
    }

    /// Stop the sweeper and drop all entries.
    pub async fn destroy(mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
        self.clear().await;
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn total_size(&self) -> usize {
        self.state.lock().await.total_size
    }

    /// Whether a live (unexpired) entry exists. Does not count as an access.
    pub async fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.state
            .lock()
            .await
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }
}

impl Drop for RuntimeCache {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

async fn run_sweeper(state: Weak<Mutex<CacheState>>, period: Duration) {
    let mut ticker = tokio::time::interval_at(deadline(Instant::now(), period), period);
    loop {
        ticker.tick().await;
        let Some(state) = state.upgrade() else {
            break;
        };
        state.lock().await.sweep();
    }
}
