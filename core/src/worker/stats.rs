//! Worker statistics tracking

use crate::response::RequestResult;
use std::time::{Duration, Instant};

/// Statistics tracked by each worker
#[derive(Debug, Default, Clone)]
pub struct WorkerStats {
    /// Worker that produced these stats
    pub worker_id: usize,

    /// Requests that succeeded
    pub completed: usize,

    /// Requests that finished without success (non-2xx included)
    pub failures: usize,

    /// Failures with no usable response (transport, protocol, timeout, cancel)
    pub errors: usize,

    /// Sum of measured latencies
    pub total_latency: Duration,

    /// Worker start time
    pub started_at: Option<Instant>,

    /// Worker end time
    pub ended_at: Option<Instant>,
}

impl WorkerStats {
    /// Create new empty stats for `worker_id`
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            ..Self::default()
        }
    }

    /// Start tracking (records start time)
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Stop tracking (records end time)
    pub fn stop(&mut self) {
        self.ended_at = Some(Instant::now());
    }

    /// Record one emitted result
    pub fn record(&mut self, result: &RequestResult) {
        if result.is_success() {
            self.completed += 1;
        } else {
            self.failures += 1;
        }
        if result.is_error() {
            self.errors += 1;
        }
        self.total_latency += result.latency;
    }

    /// Get total number of results emitted
    pub fn total_requests(&self) -> usize {
        self.completed + self.failures
    }

    /// Get success rate (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_requests() == 0 {
            0.0
        } else {
            self.completed as f64 / self.total_requests() as f64
        }
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| {
            self.ended_at
                .map(|end| end.duration_since(start))
                .unwrap_or_else(|| start.elapsed())
        })
    }

    /// Merge stats from another worker
    pub fn merge(&mut self, other: &WorkerStats) {
        self.completed += other.completed;
        self.failures += other.failures;
        self.errors += other.errors;
        self.total_latency += other.total_latency;
    }
}
