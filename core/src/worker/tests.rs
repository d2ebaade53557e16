//! Integration tests for the Worker module

use super::*;
use crate::error::BenchError;
use crate::generator::{generate, Bounded};
use crate::request::{Request, RequestPayload, VectorQuery};
use crate::response::{BackendResponse, Outcome, RequestResult};
use crate::traits::{Backend, BackendError, BackendFactory, RequestGenerator};

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Backend
// ============================================================================

struct MockBackend {
    delay: Option<Duration>,
    fail_every: Option<usize>,
    counter: AtomicUsize,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            delay: None,
            fail_every: None,
            counter: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn with_fail_every(mut self, n: usize) -> Self {
        self.fail_every = Some(n);
        self
    }

    fn calls(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, request: &Request) -> Result<BackendResponse, BackendError> {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);

        if let RequestPayload::VectorQuery(_) = request.payload {
            return Err(BackendError::UnexpectedPayload {
                expected: "none",
                found: request.payload.kind(),
            });
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(fail_every) = self.fail_every {
            if count % fail_every == fail_every - 1 {
                return Err(BackendError::Transport("connection refused".to_string()));
            }
        }

        Ok(BackendResponse::status(200))
    }
}

struct MockFactory {
    backend: Arc<MockBackend>,
    fail_worker: Option<usize>,
    connects: AtomicUsize,
}

impl MockFactory {
    fn new(backend: Arc<MockBackend>) -> Self {
        Self {
            backend,
            fail_worker: None,
            connects: AtomicUsize::new(0),
        }
    }

    fn failing_for(mut self, worker_id: usize) -> Self {
        self.fail_worker = Some(worker_id);
        self
    }
}

#[async_trait]
impl BackendFactory for MockFactory {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self, worker_id: usize) -> Result<Arc<dyn Backend>, BackendError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_worker == Some(worker_id) {
            return Err(BackendError::Config("malformed target".to_string()));
        }
        Ok(Arc::clone(&self.backend) as Arc<dyn Backend>)
    }
}

struct Repeat(Request);

impl RequestGenerator for Repeat {
    fn name(&self) -> &str {
        "repeat"
    }

    fn next_request(&mut self) -> Option<Request> {
        Some(self.0.clone())
    }
}

// ============================================================================
// Helper functions
// ============================================================================

async fn run_bounded(
    backend: Arc<MockBackend>,
    workers: usize,
    count: u64,
    timeout: Duration,
    cancel: CancellationToken,
) -> (Result<Vec<WorkerStats>, BenchError>, Vec<RequestResult>) {
    let factory = Arc::new(MockFactory::new(backend));
    let pool = WorkerPool::connect(factory, workers, timeout)
        .await
        .expect("Failed to connect pool");

    let (req_tx, req_rx) = async_channel::bounded(workers);
    let (res_tx, mut res_rx) = mpsc::channel(1024);

    let pool_handle = tokio::spawn(pool.run(cancel.clone(), req_rx, res_tx));

    let mut gen = Bounded::new(Repeat(Request::get("http://localhost/health")), count);
    generate(&mut gen, CancellationToken::new(), req_tx).await;

    let mut results = Vec::new();
    while let Some(result) = res_rx.recv().await {
        results.push(result);
    }

    let stats = pool_handle.await.expect("Pool task panicked");
    (stats, results)
}

// ============================================================================
// Integration Tests
// ============================================================================

#[tokio::test]
async fn test_pool_emits_one_result_per_request() {
    let backend = Arc::new(MockBackend::new().with_delay(Duration::from_millis(1)));
    let (stats, results) = run_bounded(
        Arc::clone(&backend),
        4,
        200,
        Duration::from_secs(1),
        CancellationToken::new(),
    )
    .await;

    let stats = stats.expect("Pool failed");
    assert_eq!(stats.len(), 4);
    assert_eq!(stats.iter().map(|s| s.total_requests()).sum::<usize>(), 200);

    assert_eq!(results.len(), 200);
    let ids: HashSet<u64> = results.iter().map(|r| r.request_id.0).collect();
    assert_eq!(ids.len(), 200, "duplicate results");
    assert_eq!(ids, (0..200).collect::<HashSet<u64>>());
    assert_eq!(backend.calls(), 200);
}

#[tokio::test]
async fn test_results_ordered_within_worker() {
    let backend = Arc::new(MockBackend::new());
    let (_, results) = run_bounded(
        backend,
        3,
        90,
        Duration::from_secs(1),
        CancellationToken::new(),
    )
    .await;

    for worker_id in 0..3 {
        let ids: Vec<u64> = results
            .iter()
            .filter(|r| r.worker_id == worker_id)
            .map(|r| r.request_id.0)
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "worker {} out of order", worker_id);
    }
}

#[tokio::test]
async fn test_transport_errors_become_results() {
    let backend = Arc::new(MockBackend::new().with_fail_every(2));
    let (stats, results) = run_bounded(
        backend,
        1,
        10,
        Duration::from_secs(1),
        CancellationToken::new(),
    )
    .await;

    let stats = stats.expect("Pool failed");
    assert_eq!(stats[0].total_requests(), 10);
    assert_eq!(stats[0].errors, 5);

    assert_eq!(results.len(), 10);
    let errors: Vec<_> = results.iter().filter(|r| r.is_error()).collect();
    assert_eq!(errors.len(), 5);
    assert!(errors
        .iter()
        .all(|r| matches!(r.outcome, Outcome::TransportError(_)) && r.outcome.status_code() == 0));
}

#[tokio::test]
async fn test_timeout_becomes_result() {
    let backend = Arc::new(MockBackend::new().with_delay(Duration::from_millis(200)));
    let (stats, results) = run_bounded(
        backend,
        2,
        4,
        Duration::from_millis(20),
        CancellationToken::new(),
    )
    .await;

    assert!(stats.is_ok());
    assert_eq!(results.len(), 4);
    for result in &results {
        assert_eq!(result.outcome, Outcome::TimedOut);
        assert!(result.latency < Duration::from_millis(200));
    }
}

#[tokio::test]
async fn test_request_deadline_caps_timeout() {
    let backend: Arc<dyn Backend> =
        Arc::new(MockBackend::new().with_delay(Duration::from_millis(200)));
    let worker = WorkerBuilder::new(0)
        .backend(backend)
        .timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to build worker");

    let (req_tx, req_rx) = async_channel::bounded(1);
    let (res_tx, mut res_rx) = mpsc::channel(1);
    req_tx
        .send(Request::get("http://localhost").with_deadline(Duration::from_millis(10)))
        .await
        .unwrap();
    drop(req_tx);

    let stats = worker
        .run(CancellationToken::new(), req_rx, res_tx)
        .await
        .expect("Worker failed");
    assert_eq!(stats.errors, 1);
    assert_eq!(res_rx.recv().await.unwrap().outcome, Outcome::TimedOut);
}

#[tokio::test]
async fn test_outer_cancel_abandons_in_flight_call() {
    let backend = Arc::new(MockBackend::new().with_delay(Duration::from_secs(30)));
    let factory = Arc::new(MockFactory::new(Arc::clone(&backend)));
    let pool = WorkerPool::connect(factory, 2, Duration::from_secs(60))
        .await
        .expect("Failed to connect pool");

    let cancel = CancellationToken::new();
    let (req_tx, req_rx) = async_channel::bounded(8);
    let (res_tx, mut res_rx) = mpsc::channel(16);
    for _ in 0..6 {
        req_tx.send(Request::get("http://localhost")).await.unwrap();
    }
    drop(req_tx);

    let handle = tokio::spawn(pool.run(cancel.clone(), req_rx, res_tx));
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let stats = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("Pool did not drain after cancellation")
        .expect("Pool task panicked")
        .expect("Pool failed");

    // Two calls were in flight; the other four are drained without dispatch
    assert_eq!(backend.calls(), 2);
    assert_eq!(stats.iter().map(|s| s.total_requests()).sum::<usize>(), 6);

    let mut cancelled = 0;
    while let Some(result) = res_rx.recv().await {
        assert_eq!(result.outcome, Outcome::Cancelled);
        cancelled += 1;
    }
    assert_eq!(cancelled, 6);
}

#[tokio::test]
async fn test_fatal_payload_mismatch_aborts_pool() {
    let backend = Arc::new(MockBackend::new().with_delay(Duration::from_millis(5)));
    let factory = Arc::new(MockFactory::new(backend));
    let pool = WorkerPool::connect(factory, 2, Duration::from_secs(1))
        .await
        .expect("Failed to connect pool");

    let cancel = CancellationToken::new();
    let (req_tx, req_rx) = async_channel::bounded(4);
    let (res_tx, _res_rx) = mpsc::channel(64);

    let handle = tokio::spawn(pool.run(cancel.clone(), req_rx, res_tx));

    let query = Arc::new(VectorQuery::new("items", vec![0.5]));
    req_tx
        .send(Request::vector_query("http://localhost:6333", query))
        .await
        .unwrap();
    drop(req_tx);

    let result = handle.await.expect("Pool task panicked");
    assert!(matches!(result, Err(BenchError::Fatal(_))));
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn test_connect_failure_is_fatal() {
    let factory = Arc::new(MockFactory::new(Arc::new(MockBackend::new())).failing_for(2));
    let result = WorkerPool::connect(factory, 4, Duration::from_secs(1)).await;

    match result {
        Err(BenchError::Connect { worker_id, message }) => {
            assert_eq!(worker_id, 2);
            assert!(message.contains("malformed target"));
        }
        other => panic!("Expected connect error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connect_waits_for_every_worker() {
    let factory = Arc::new(MockFactory::new(Arc::new(MockBackend::new())));
    let pool = WorkerPool::connect(
        Arc::clone(&factory) as Arc<dyn BackendFactory>,
        5,
        Duration::from_secs(1),
    )
    .await
    .expect("Failed to connect pool");

    assert_eq!(pool.len(), 5);
    assert_eq!(factory.connects.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_empty_pool_rejected() {
    let factory = Arc::new(MockFactory::new(Arc::new(MockBackend::new())));
    assert!(WorkerPool::connect(factory, 0, Duration::from_secs(1))
        .await
        .is_err());
    assert!(WorkerPool::new(Vec::new()).is_err());
}
