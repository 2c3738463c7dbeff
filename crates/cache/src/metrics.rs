//! Hit-rate telemetry and the performance log.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

/// Number of samples kept in the performance log.
pub const PERFORMANCE_LOG_CAPACITY: usize = 100;

/// Aggregate counters, snapshotted by `RuntimeCache::get_metrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    /// Percentage of lookups that hit, `[0, 100]`.
    pub hit_rate: f64,
    pub sets: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Entries refused because they exceed the whole budget.
    pub rejected: u64,
    pub compressed_entries: u64,
    pub total_entries: usize,
    pub total_size: usize,
}

impl CacheMetrics {
    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
        self.refresh_hit_rate();
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
        self.refresh_hit_rate();
    }

    fn refresh_hit_rate(&mut self) {
        let lookups = self.hits + self.misses;
        self.hit_rate = if lookups == 0 { 0.0 } else { self.hits as f64 / lookups as f64 * 100.0 };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Get,
    Set,
    Sweep,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSample {
    pub operation: Operation,
    pub key: Option<String>,
    pub duration: Duration,
    pub hit: Option<bool>,
}

/// Bounded log of recent operation timings, oldest dropped first.
#[derive(Debug, Default)]
pub(crate) struct PerformanceLog {
    samples: VecDeque<PerformanceSample>,
}

impl PerformanceLog {
    pub(crate) fn push(&mut self, sample: PerformanceSample) {
        if self.samples.len() == PERFORMANCE_LOG_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub(crate) fn snapshot(&self) -> Vec<PerformanceSample> {
        self.samples.iter().cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let mut metrics = CacheMetrics::default();
        assert_eq!(metrics.hit_rate, 0.0);

        metrics.record_miss();
        assert_eq!(metrics.hit_rate, 0.0);

        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        assert_eq!(metrics.hit_rate, 75.0);
    }

    #[test]
    fn test_log_is_bounded() {
        let mut log = PerformanceLog::default();
        for i in 0..(PERFORMANCE_LOG_CAPACITY + 10) {
            log.push(PerformanceSample {
                operation: Operation::Get,
                key: Some(format!("k{i}")),
                duration: Duration::from_micros(i as u64),
                hit: Some(false),
            });
        }

        let samples = log.snapshot();
        assert_eq!(samples.len(), PERFORMANCE_LOG_CAPACITY);
        assert_eq!(samples[0].key.as_deref(), Some("k10"));
    }
}
