//! Result collection
//!
//! The collector is the single consumer of the result channel. It keeps
//! [`RunningStats`] current, emits a [`ProgressSnapshot`] on every tick of
//! the snapshot interval, and produces the [`FinalReport`] once the result
//! channel closes.

mod report;
mod stats;

pub use report::{FinalReport, ProgressSnapshot, SearchSummary};
pub use stats::RunningStats;

use crate::config::Protocol;
use crate::response::RequestResult;

use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Consumes results until every producer is gone
pub struct Collector {
    protocol: Protocol,
    interval: Duration,
    snapshots: Option<mpsc::Sender<ProgressSnapshot>>,
}

impl Collector {
    /// Create a collector that ticks every `interval`
    pub fn new(protocol: Protocol, interval: Duration) -> Self {
        Self {
            protocol,
            interval,
            snapshots: None,
        }
    }

    /// Publish snapshots on `tx`; a full channel skips the snapshot
    pub fn with_snapshots(mut self, tx: mpsc::Sender<ProgressSnapshot>) -> Self {
        self.snapshots = Some(tx);
        self
    }

    /// Run until `results` closes or `cancel` fires
    ///
    /// `cancel` is the hard-stop token only. Results that workers report
    /// after the measurement window are still counted.
    pub async fn collect(
        self,
        cancel: CancellationToken,
        mut results: mpsc::Receiver<RequestResult>,
    ) -> FinalReport {
        let mut stats = RunningStats::new();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(responses = stats.responses(), "Collector stopped by hard cancel");
                    break;
                }
                _ = ticker.tick() => self.emit(&stats),
                received = results.recv() => match received {
                    Some(result) => stats.record_at(&result, Instant::now()),
                    None => {
                        debug!(responses = stats.responses(), "Result channel closed");
                        break;
                    }
                },
            }
        }

        stats.finish_at(self.protocol, Instant::now())
    }

    fn emit(&self, stats: &RunningStats) {
        let Some(snapshot) = stats.snapshot_at(Instant::now()) else {
            return;
        };
        trace!(%snapshot, "Progress");

        if let Some(tx) = &self.snapshots {
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(snapshot) {
                trace!("Snapshot channel full, skipping");
            }
        }
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("protocol", &self.protocol)
            .field("interval", &self.interval)
            .field("snapshots", &self.snapshots.is_some())
            .finish()
    }
}
