//! Snapshot and final report types

use crate::config::Protocol;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Averages over vector-search results
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchSummary {
    /// Mean number of points returned per response
    pub avg_points: f64,
    /// Mean best score per response
    pub avg_best_score: f64,
}

/// Periodic progress line emitted while a run is in flight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Results received so far
    pub responses: u64,
    /// Error-classified results so far
    pub errors: u64,
    /// Responses per second since the first request
    pub rate: f64,
    /// Mean latency so far
    #[serde(with = "humantime_serde")]
    pub mean_latency: Duration,
    /// Vector-search averages, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchSummary>,
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "responses total: {}; avg rps: {:.3}; avg duration: {:?}",
            self.responses, self.rate, self.mean_latency
        )?;
        if let Some(search) = &self.search {
            write!(
                f,
                "; avg points count: {:.3}; avg max score: {:.3}",
                search.avg_points, search.avg_best_score
            )?;
        }
        Ok(())
    }
}

/// Summary of a whole run
///
/// `rate` and `mean_latency` are `None` when no result was received.
#[derive(Debug, Clone, Serialize)]
pub struct FinalReport {
    /// Backend protocol of the run
    pub protocol: Protocol,
    /// First request dispatch, backdated from the first result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the report was produced
    pub ended_at: DateTime<Utc>,
    /// Total results
    pub responses: u64,
    /// Successful results
    pub successes: u64,
    /// Results without a usable response
    pub errors: u64,
    /// Responses per second since the first request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    /// Mean latency over all results
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub mean_latency: Option<Duration>,
    /// Count per status code, `0` for results without one
    pub status_codes: BTreeMap<u16, u64>,
    /// Count per outcome class
    pub outcomes: BTreeMap<String, u64>,
    /// Vector-search averages, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchSummary>,
}

impl FinalReport {
    /// Results that were not successes
    pub fn failures(&self) -> u64 {
        self.responses - self.successes
    }
}

impl fmt::Display for FinalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.started_at {
            Some(started) => writeln!(f, "test started: {}", started.to_rfc3339())?,
            None => writeln!(f, "test started: -")?,
        }
        writeln!(f, "test ended: {}", self.ended_at.to_rfc3339())?;
        writeln!(f, "responses total: {}", self.responses)?;

        if self.responses == 0 {
            return writeln!(f, "no responses received");
        }

        match self.protocol {
            Protocol::Http => {
                writeln!(f, "http status stats:")?;
                for (code, count) in &self.status_codes {
                    writeln!(f, ">>> status: {code} count: {count}")?;
                }
            }
            Protocol::VectorSearch => {}
        }
        writeln!(f, "outcome stats:")?;
        for (class, count) in &self.outcomes {
            writeln!(f, ">>> {class} count: {count}")?;
        }
        writeln!(f, "errors: {}", self.errors)?;

        if let Some(search) = &self.search {
            writeln!(f, "avg points count: {:.3}", search.avg_points)?;
            writeln!(f, "avg max score: {:.3}", search.avg_best_score)?;
        }
        if let Some(rate) = self.rate {
            writeln!(f, "avg rps: {rate:.3}")?;
        }
        if let Some(mean) = self.mean_latency {
            writeln!(f, "avg duration: {mean:?}")?;
        }
        Ok(())
    }
}
