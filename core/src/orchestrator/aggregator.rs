//! Result aggregation from multiple workers

use std::time::Duration;

use crate::worker::WorkerStats;

/// Aggregated statistics from all workers
#[derive(Debug, Clone, Default)]
pub struct AggregatedStats {
    /// Number of workers that completed
    pub total_workers: usize,

    /// Total successful requests
    pub total_completed: usize,

    /// Total unsuccessful requests
    pub total_failures: usize,

    /// Unsuccessful requests without a usable response
    pub total_errors: usize,

    /// Sum of latencies across all workers
    pub total_latency: Duration,

    /// Maximum duration across all workers
    pub total_duration: Duration,

    /// Overall requests per second
    pub requests_per_second: f64,
}

impl AggregatedStats {
    /// Get the total number of requests (completed + failures)
    pub fn total_requests(&self) -> usize {
        self.total_completed + self.total_failures
    }

    /// Get the success rate (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total > 0 {
            self.total_completed as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Mean latency over every request, if any ran
    pub fn mean_latency(&self) -> Option<Duration> {
        let total = self.total_requests() as u128;
        if total == 0 {
            return None;
        }
        Some(Duration::from_nanos(
            (self.total_latency.as_nanos() / total) as u64,
        ))
    }
}

/// Aggregate statistics from multiple workers
pub fn aggregate_worker_stats(stats: &[WorkerStats]) -> AggregatedStats {
    if stats.is_empty() {
        return AggregatedStats::default();
    }

    let totals = stats.iter().fold(WorkerStats::default(), |mut acc, s| {
        acc.merge(s);
        acc
    });

    // Use the maximum elapsed time across all workers
    let total_duration = stats
        .iter()
        .filter_map(|s| s.elapsed())
        .max()
        .unwrap_or(Duration::ZERO);

    let secs = total_duration.as_secs_f64();
    let requests_per_second = if secs > 0.0 {
        totals.total_requests() as f64 / secs
    } else {
        0.0
    };

    AggregatedStats {
        total_workers: stats.len(),
        total_completed: totals.completed,
        total_failures: totals.failures,
        total_errors: totals.errors,
        total_latency: totals.total_latency,
        total_duration,
        requests_per_second,
    }
}
