//! Fixed-size worker pool with a readiness barrier

use crate::error::{BenchError, BenchResult};
use crate::request::Request;
use crate::response::RequestResult;
use crate::traits::BackendFactory;

use super::builder::WorkerBuilder;
use super::executor::Worker;
use super::stats::WorkerStats;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// A pool of N workers sharing one request queue
pub struct WorkerPool {
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Build a pool from already-constructed workers
    pub fn new(workers: Vec<Worker>) -> BenchResult<Self> {
        if workers.is_empty() {
            return Err(BenchError::config("worker pool needs at least one worker"));
        }
        Ok(Self { workers })
    }

    /// Connect `count` backend sessions concurrently and build the pool
    ///
    /// Returns only once every session is established. The first failure
    /// aborts the remaining connection attempts and fails the whole pool:
    /// a load test cannot run with a broken backend.
    pub async fn connect(
        factory: Arc<dyn BackendFactory>,
        count: usize,
        timeout: Duration,
    ) -> BenchResult<Self> {
        if count == 0 {
            return Err(BenchError::config("worker pool needs at least one worker"));
        }

        let mut pending = JoinSet::new();
        for worker_id in 0..count {
            let factory = Arc::clone(&factory);
            pending.spawn(async move { (worker_id, factory.connect(worker_id).await) });
        }

        let mut backends = vec![None; count];
        while let Some(joined) = pending.join_next().await {
            let (worker_id, connected) = joined.map_err(|e| {
                BenchError::orchestration(format!("backend connection task failed: {}", e))
            })?;
            let backend = connected.map_err(|e| {
                tracing::error!(worker_id, error = %e, "Worker could not connect");
                BenchError::connect(worker_id, e.to_string())
            })?;
            tracing::debug!(worker_id, backend = backend.name(), "Worker is ready");
            backends[worker_id] = Some(backend);
        }

        let workers = backends
            .into_iter()
            .enumerate()
            .map(|(worker_id, backend)| {
                let backend = backend.ok_or_else(|| {
                    BenchError::orchestration(format!("worker {} never reported", worker_id))
                })?;
                WorkerBuilder::new(worker_id)
                    .backend(backend)
                    .timeout(timeout)
                    .build()
            })
            .collect::<BenchResult<Vec<_>>>()?;

        tracing::info!(workers = count, backend = factory.name(), "All workers ready");

        Ok(Self { workers })
    }

    /// Number of workers
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the pool has no workers (never true for a constructed pool)
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Launch every worker and wait for all of them to exit
    ///
    /// The pool hands each worker its own clone of the queues and drops its
    /// own handles, so the result queue closes once the last worker exits.
    /// A fatal error in one worker cancels `cancel` so the rest of the
    /// pipeline drains, and is returned after every worker has stopped.
    pub async fn run(
        self,
        cancel: CancellationToken,
        requests: async_channel::Receiver<Request>,
        results: mpsc::Sender<RequestResult>,
    ) -> BenchResult<Vec<WorkerStats>> {
        let mut running = JoinSet::new();
        for worker in self.workers {
            let cancel = cancel.clone();
            let requests = requests.clone();
            let results = results.clone();
            running.spawn(async move { worker.run(cancel, requests, results).await });
        }
        drop(requests);
        drop(results);

        let mut finished = Vec::with_capacity(running.len());
        let mut fatal: Option<BenchError> = None;

        while let Some(joined) = running.join_next().await {
            match joined {
                Ok(Ok(stats)) => finished.push(stats),
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Worker stopped with a fatal error");
                    cancel.cancel();
                    fatal.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Worker task panicked");
                    cancel.cancel();
                    fatal.get_or_insert(BenchError::orchestration(format!(
                        "worker task failed: {}",
                        e
                    )));
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        finished.sort_by_key(|stats| stats.worker_id);
        Ok(finished)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .finish()
    }
}
