//! Worker execution loop

use crate::error::{BenchError, BenchResult};
use crate::request::Request;
use crate::response::{Outcome, RequestResult, ResultPayload};
use crate::traits::{Backend, BackendError};

use super::stats::WorkerStats;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Worker executes requests in a loop: pull -> execute -> report -> repeat
///
/// Workers are tokio tasks managed by the [`WorkerPool`](super::WorkerPool).
/// Each owns one backend session, shares the request queue with its
/// siblings and sends results through an mpsc channel.
pub struct Worker {
    /// Unique worker identifier
    id: usize,

    /// Backend session owned by this worker
    backend: Arc<dyn Backend>,

    /// Per-request timeout
    timeout: Duration,
}

impl Worker {
    /// Create a new worker
    pub fn new(id: usize, backend: Arc<dyn Backend>, timeout: Duration) -> Self {
        Self {
            id,
            backend,
            timeout,
        }
    }

    /// Run the worker loop
    ///
    /// Exits when `requests` reaches end-of-stream (or the result queue is
    /// gone). Every request pulled yields exactly one result, including when
    /// `cancel` has already fired: such requests are not dispatched and are
    /// reported as [`Outcome::Cancelled`]. Returns an error only for fatal
    /// backend errors.
    pub async fn run(
        self,
        cancel: CancellationToken,
        requests: async_channel::Receiver<Request>,
        results: mpsc::Sender<RequestResult>,
    ) -> BenchResult<WorkerStats> {
        let mut stats = WorkerStats::new(self.id);
        stats.start();

        tracing::debug!(worker_id = self.id, backend = self.backend.name(), "Worker started");

        while let Ok(request) = requests.recv().await {
            let result = self.execute_one(&request, &cancel).await?;
            stats.record(&result);

            if results.send(result).await.is_err() {
                tracing::debug!(worker_id = self.id, "Result channel closed, worker stopping");
                break;
            }
        }

        stats.stop();
        tracing::debug!(
            worker_id = self.id,
            completed = stats.completed,
            failures = stats.failures,
            errors = stats.errors,
            elapsed_ms = ?stats.elapsed().map(|d| d.as_millis()),
            "Worker finished"
        );

        Ok(stats)
    }

    /// Execute a single request
    ///
    /// Latency runs from immediately before dispatch to immediately after
    /// the backend returns.
    async fn execute_one(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> BenchResult<RequestResult> {
        let timeout = request.effective_timeout(self.timeout);

        let start = Instant::now();
        let (outcome, payload) = tokio::select! {
            biased;

            // Outer scope has priority: abandon the call, keep the result
            _ = cancel.cancelled() => (Outcome::Cancelled, ResultPayload::None),

            executed = tokio::time::timeout(timeout, self.backend.execute(request)) => {
                match executed {
                    Err(_elapsed) => (Outcome::TimedOut, ResultPayload::None),
                    Ok(Ok(response)) => (response.outcome, response.payload),
                    Ok(Err(e)) => (self.classify(request, e)?, ResultPayload::None),
                }
            }
        };
        let latency = start.elapsed();

        if let Some(message) = outcome.error_message() {
            tracing::debug!(
                worker_id = self.id,
                request_id = %request.id,
                latency = ?latency,
                error = message,
                "Request failed"
            );
        }

        Ok(RequestResult {
            request_id: request.id,
            worker_id: self.id,
            latency,
            outcome,
            payload,
        })
    }

    /// Turn a recoverable backend error into an outcome, or surface a fatal one
    fn classify(&self, request: &Request, error: BackendError) -> BenchResult<Outcome> {
        if error.is_fatal() {
            tracing::error!(
                worker_id = self.id,
                request_id = %request.id,
                target = %request.target,
                error = %error,
                "Fatal backend error"
            );
            return Err(BenchError::fatal(format!(
                "worker {} request {}: {}",
                self.id, request.id, error
            )));
        }

        Ok(match error {
            BackendError::Transport(message) => Outcome::TransportError(message),
            BackendError::Protocol(message) => Outcome::ProtocolError(message),
            other => Outcome::ProtocolError(other.to_string()),
        })
    }

    /// Get the worker ID
    pub fn id(&self) -> usize {
        self.id
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("backend", &self.backend.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}
