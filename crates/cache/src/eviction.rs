//! Eviction strategies.
//!
//! A strategy only decides the order in which entries are given up; the
//! cache removes from the front of that order until the new entry fits.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entry::CacheEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Least recently used: oldest access first.
    #[default]
    Lru,
    /// Least frequently used: fewest hits first.
    Lfu,
    /// Soonest expiry first.
    Ttl,
    /// Insertion order.
    Fifo,
}

impl EvictionStrategy {
    fn compare(&self, a: &CacheEntry, b: &CacheEntry) -> Ordering {
        match self {
            EvictionStrategy::Lru => a
                .last_accessed
                .cmp(&b.last_accessed)
                .then(a.touched.cmp(&b.touched)),
            EvictionStrategy::Lfu => a.hits.cmp(&b.hits).then(a.touched.cmp(&b.touched)),
            EvictionStrategy::Ttl => a
                .expires_at
                .cmp(&b.expires_at)
                .then(a.inserted.cmp(&b.inserted)),
            EvictionStrategy::Fifo => a.inserted.cmp(&b.inserted),
        }
    }

    /// Keys in the order they should be evicted.
    pub(crate) fn victim_order(&self, entries: &HashMap<String, CacheEntry>) -> Vec<String> {
        let mut candidates: Vec<(&String, &CacheEntry)> = entries.iter().collect();
        candidates.sort_by(|(_, a), (_, b)| self.compare(a, b));
        candidates.into_iter().map(|(key, _)| key.clone()).collect()
    }
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvictionStrategy::Lru => "lru",
            EvictionStrategy::Lfu => "lfu",
            EvictionStrategy::Ttl => "ttl",
            EvictionStrategy::Fifo => "fifo",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Payload;
    use std::time::Duration;
    use tokio::time::Instant;

    fn entry(base: Instant, inserted: u64, touched: u64, hits: u64, ttl_secs: u64, accessed_secs: u64) -> CacheEntry {
        CacheEntry {
            payload: Payload::Raw(String::new()),
            created_at: base,
            expires_at: base + Duration::from_secs(ttl_secs),
            last_accessed: base + Duration::from_secs(accessed_secs),
            hits,
            size: 1,
            inserted,
            touched,
        }
    }

    fn sample() -> HashMap<String, CacheEntry> {
        let base = Instant::now();
        HashMap::from([
            ("a".to_string(), entry(base, 1, 5, 10, 300, 30)),
            ("b".to_string(), entry(base, 2, 4, 1, 100, 20)),
            ("c".to_string(), entry(base, 3, 6, 5, 200, 10)),
        ])
    }

    #[test]
    fn test_lru_order() {
        assert_eq!(EvictionStrategy::Lru.victim_order(&sample()), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_lfu_order() {
        assert_eq!(EvictionStrategy::Lfu.victim_order(&sample()), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_ttl_order() {
        assert_eq!(EvictionStrategy::Ttl.victim_order(&sample()), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_fifo_order() {
        assert_eq!(EvictionStrategy::Fifo.victim_order(&sample()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_lru_ties_broken_by_sequence() {
        let base = Instant::now();
        let entries = HashMap::from([
            ("late".to_string(), entry(base, 1, 9, 0, 60, 0)),
            ("early".to_string(), entry(base, 2, 3, 0, 60, 0)),
        ]);
        assert_eq!(EvictionStrategy::Lru.victim_order(&entries), vec!["early", "late"]);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&EvictionStrategy::Fifo).unwrap(), "\"fifo\"");
        assert_eq!(EvictionStrategy::Ttl.to_string(), "ttl");
    }
}
