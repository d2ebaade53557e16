//! Running aggregates maintained by the collector

use crate::config::Protocol;
use crate::response::{RequestResult, ResultPayload};

use super::report::{FinalReport, ProgressSnapshot, SearchSummary};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Monotonic counters over every result seen
///
/// Updates go through [`record_at`](Self::record_at) and derived values
/// through [`snapshot_at`](Self::snapshot_at) with an explicit `now`, so
/// rates are reproducible in tests. Once set, the first-response timestamp
/// never changes.
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    responses: u64,
    successes: u64,
    errors: u64,
    total_latency: Duration,
    status_codes: BTreeMap<u16, u64>,
    outcomes: BTreeMap<String, u64>,
    searches: u64,
    points_found: u64,
    best_score_sum: f64,
    first_response_at: Option<Instant>,
    started_at: Option<DateTime<Utc>>,
}

impl RunningStats {
    /// Create empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one result into the aggregates, observed at `now`
    ///
    /// Results arrive as a merge of independent worker streams, so the test
    /// start is backdated from the first *received* result by its latency
    /// rather than taken from any request id.
    pub fn record_at(&mut self, result: &RequestResult, now: Instant) {
        self.responses += 1;
        self.total_latency += result.latency;

        if self.first_response_at.is_none() {
            self.first_response_at = Some(now.checked_sub(result.latency).unwrap_or(now));
            let backdate = chrono::Duration::from_std(result.latency).unwrap_or_default();
            self.started_at = Some(Utc::now() - backdate);
        }

        if result.is_success() {
            self.successes += 1;
        }
        if result.is_error() {
            self.errors += 1;
        }

        *self
            .status_codes
            .entry(result.outcome.status_code())
            .or_insert(0) += 1;
        *self.outcomes.entry(result.outcome.class()).or_insert(0) += 1;

        match result.payload {
            ResultPayload::Search { points, best_score } => {
                self.searches += 1;
                self.points_found += points as u64;
                self.best_score_sum += f64::from(best_score);
            }
            ResultPayload::None => {}
        }
    }

    /// Total results seen
    pub fn responses(&self) -> u64 {
        self.responses
    }

    /// Error-classified results seen
    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Moment the first request is estimated to have been dispatched
    pub fn first_response_at(&self) -> Option<Instant> {
        self.first_response_at
    }

    /// Time since the first request, as of `now`
    pub fn elapsed_at(&self, now: Instant) -> Option<Duration> {
        self.first_response_at
            .map(|first| now.saturating_duration_since(first))
    }

    /// `responses / elapsed`, or `None` before any result or at zero elapsed
    pub fn rate_at(&self, now: Instant) -> Option<f64> {
        let secs = self.elapsed_at(now)?.as_secs_f64();
        if self.responses == 0 || secs <= 0.0 {
            return None;
        }
        Some(self.responses as f64 / secs)
    }

    /// `total_latency / responses`, or `None` before any result
    pub fn mean_latency(&self) -> Option<Duration> {
        if self.responses == 0 {
            return None;
        }
        let mean = self.total_latency.as_nanos() / u128::from(self.responses);
        Some(Duration::from_nanos(mean as u64))
    }

    /// Averages over vector-search results, if any were seen
    pub fn search_summary(&self) -> Option<SearchSummary> {
        if self.searches == 0 || self.responses == 0 {
            return None;
        }
        let n = self.responses as f64;
        Some(SearchSummary {
            avg_points: self.points_found as f64 / n,
            avg_best_score: self.best_score_sum / n,
        })
    }

    /// Progress snapshot as of `now`; `None` until the first result
    pub fn snapshot_at(&self, now: Instant) -> Option<ProgressSnapshot> {
        Some(ProgressSnapshot {
            responses: self.responses,
            errors: self.errors,
            rate: self.rate_at(now)?,
            mean_latency: self.mean_latency()?,
            search: self.search_summary(),
        })
    }

    /// Final report as of `now`
    pub fn finish_at(&self, protocol: Protocol, now: Instant) -> FinalReport {
        FinalReport {
            protocol,
            started_at: self.started_at,
            ended_at: Utc::now(),
            responses: self.responses,
            successes: self.successes,
            errors: self.errors,
            rate: self.rate_at(now),
            mean_latency: self.mean_latency(),
            status_codes: self.status_codes.clone(),
            outcomes: self.outcomes.clone(),
            search: self.search_summary(),
        }
    }
}
