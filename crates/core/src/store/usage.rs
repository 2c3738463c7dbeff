//! Per-task usage statistics.
//!
//! The success rate is stored as a percentage only. Each update rebuilds an
//! approximate success count from the previous percentage, so the rate can
//! drift by rounding over long mixed sequences.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Store, keys};
use crate::Error;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub usage_count: u64,
    /// Percentage in `[0, 100]`.
    pub success_rate: f64,
    pub average_execution_time_ms: f64,
    pub last_used: Option<DateTime<Utc>>,
    pub error_count: u64,
}

pub type UsageMap = BTreeMap<String, UsageMetrics>;

impl UsageMetrics {
    /// Fold one execution into the running aggregates.
    pub fn record(&mut self, success: bool, elapsed: Duration, at: DateTime<Utc>) {
        let n = self.usage_count + 1;
        let prior = n - 1;

        let prior_successes = (self.success_rate * prior as f64 / 100.0).round();
        let successes = prior_successes + if success { 1.0 } else { 0.0 };
        self.success_rate = (successes / n as f64 * 100.0).clamp(0.0, 100.0);

        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        self.average_execution_time_ms = (self.average_execution_time_ms * prior as f64 + elapsed_ms) / n as f64;

        if !success {
            self.error_count += 1;
        }
        self.usage_count = n;
        self.last_used = Some(at);
    }
}

impl Store {
    /// Record one execution of `task_id`. Returns the updated metrics.
    ///
    /// Also bumps the task's own usage counter when the task exists.
    pub async fn record_usage(&self, task_id: &str, success: bool, elapsed: Duration) -> Result<UsageMetrics, Error> {
        let mut stats = self.get_all_usage_stats().await?;
        let metrics = stats.entry(task_id.to_string()).or_default();
        metrics.record(success, elapsed, Utc::now());
        let updated = metrics.clone();
        self.write(keys::USAGE_STATS, &stats).await?;

        self.increment_task_usage(task_id).await?;

        tracing::debug!(
            task_id,
            success,
            usage_count = updated.usage_count,
            success_rate = updated.success_rate,
            "Recorded task usage"
        );
        Ok(updated)
    }

    pub async fn get_usage_stats(&self, task_id: &str) -> Result<Option<UsageMetrics>, Error> {
        Ok(self.get_all_usage_stats().await?.remove(task_id))
    }

    pub async fn get_all_usage_stats(&self) -> Result<UsageMap, Error> {
        Ok(self.read(keys::USAGE_STATS).await?.unwrap_or_default())
    }

    pub(crate) async fn remove_usage_stats(&self, task_id: &str) -> Result<(), Error> {
        let mut stats = self.get_all_usage_stats().await?;
        if stats.remove(task_id).is_some() {
            self.write(keys::USAGE_STATS, &stats).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tasks::tests::make_test_task;
    use crate::store::tests::plain_settings;

    #[test]
    fn test_consecutive_successes_reach_100() {
        let mut metrics = UsageMetrics::default();
        let now = Utc::now();
        for n in 1..=1000u64 {
            metrics.record(true, Duration::from_millis(10), now);
            assert!((metrics.success_rate - 100.0).abs() <= 1.0, "n={n} rate={}", metrics.success_rate);
        }
        assert_eq!(metrics.usage_count, 1000);
        assert_eq!(metrics.error_count, 0);
    }

    #[test]
    fn test_alternating_outcomes_stay_in_range() {
        let mut metrics = UsageMetrics::default();
        let now = Utc::now();
        for n in 0..1000u64 {
            metrics.record(n % 2 == 0, Duration::from_millis(5), now);
            assert!((0.0..=100.0).contains(&metrics.success_rate), "n={n} rate={}", metrics.success_rate);
        }
        assert_eq!(metrics.error_count, 500);
    }

    #[test]
    fn test_first_failure_is_zero() {
        let mut metrics = UsageMetrics::default();
        metrics.record(false, Duration::from_millis(100), Utc::now());
        assert_eq!(metrics.success_rate, 0.0);
        assert_eq!(metrics.error_count, 1);
        assert_eq!(metrics.average_execution_time_ms, 100.0);
    }

    #[test]
    fn test_average_execution_time() {
        let mut metrics = UsageMetrics::default();
        let now = Utc::now();
        metrics.record(true, Duration::from_millis(100), now);
        metrics.record(true, Duration::from_millis(300), now);
        assert!((metrics.average_execution_time_ms - 200.0).abs() < 1e-9);
        assert_eq!(metrics.last_used, Some(now));
    }

    #[tokio::test]
    async fn test_record_usage_persists_and_bumps_task() {
        let store = Store::ephemeral(plain_settings()).await.unwrap();
        let id = store.create_task(make_test_task("Counted", &["example"])).await.unwrap();

        store.record_usage(&id, true, Duration::from_millis(50)).await.unwrap();
        let metrics = store.record_usage(&id, false, Duration::from_millis(150)).await.unwrap();

        assert_eq!(metrics.usage_count, 2);
        assert_eq!(metrics.success_rate, 50.0);
        assert_eq!(metrics.error_count, 1);
        assert_eq!(store.get_usage_stats(&id).await.unwrap(), Some(metrics));
        assert_eq!(store.get_task(&id).await.unwrap().unwrap().usage_count, 2);
    }

    #[tokio::test]
    async fn test_record_usage_for_unknown_task() {
        let store = Store::ephemeral(plain_settings()).await.unwrap();
        store.record_usage("ghost", true, Duration::ZERO).await.unwrap();
        assert!(store.get_usage_stats("ghost").await.unwrap().is_some());
        assert!(store.get_task("ghost").await.unwrap().is_none());
    }
}
