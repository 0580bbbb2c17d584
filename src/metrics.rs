//! Refresh health metrics
//!
//! Tracks latency percentiles and the success rate of market fetches.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Point-in-time view of the refresh metrics
#[derive(Debug, Clone, PartialEq)]
pub struct SyncMetricsSnapshot {
    /// Name of the provider being measured
    pub provider_name: String,
    /// 50th percentile latency of successful fetches, in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful fetches, in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of fetches (lifetime)
    pub total_fetches: u64,
    /// Number of failed fetches (lifetime)
    pub failed_fetches: u64,
    /// When the most recent failure happened
    pub last_failure: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct Counters {
    samples: VecDeque<LatencySample>,
    total: u64,
    failed: u64,
    last_failure: Option<DateTime<Utc>>,
}

/// Collects fetch outcomes for one provider
#[derive(Debug)]
pub struct SyncMetrics {
    provider_name: String,
    counters: Mutex<Counters>,
}

impl SyncMetrics {
    /// Creates an empty collector for `provider_name`
    pub fn new(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Records a fetch with its duration and outcome
    pub fn record_fetch(&self, duration: Duration, success: bool) {
        let mut counters = self.counters.lock();
        counters.total += 1;
        if !success {
            counters.failed += 1;
            counters.last_failure = Some(Utc::now());
        }

        if counters.samples.len() >= MAX_SAMPLES {
            counters.samples.pop_front();
        }
        counters.samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
        });
    }

    /// Computes percentiles and rates over the current sample window
    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        let counters = self.counters.lock();

        let mut latencies: Vec<f64> = counters
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();
        latencies.sort_by(|a, b| a.total_cmp(b));

        let success_rate = if counters.total > 0 {
            (counters.total - counters.failed) as f64 / counters.total as f64
        } else {
            1.0
        };

        SyncMetricsSnapshot {
            provider_name: self.provider_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_fetches: counters.total,
            failed_fetches: counters.failed,
            last_failure: counters.last_failure,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_fetches() {
        let metrics = SyncMetrics::new("test");

        metrics.record_fetch(Duration::from_millis(100), true);
        metrics.record_fetch(Duration::from_millis(200), true);
        metrics.record_fetch(Duration::from_millis(150), false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.provider_name, "test");
        assert_eq!(snapshot.total_fetches, 3);
        assert_eq!(snapshot.failed_fetches, 1);
        assert!(snapshot.last_failure.is_some());
        assert!(snapshot.success_rate > 0.6 && snapshot.success_rate < 0.7);
        assert!(snapshot.latency_p99_ms >= snapshot.latency_p50_ms);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = SyncMetrics::new("idle").snapshot();
        assert_eq!(snapshot.total_fetches, 0);
        assert_eq!(snapshot.success_rate, 1.0);
        assert_eq!(snapshot.latency_p50_ms, 0.0);
    }

    #[test]
    fn test_percentile() {
        let values: Vec<f64> = (1..=11).map(f64::from).collect();
        assert_eq!(percentile(&values, 50.0), 6.0);
        assert_eq!(percentile(&values, 99.0), 11.0);
        assert_eq!(percentile(&[4.0], 99.0), 4.0);
    }
}
