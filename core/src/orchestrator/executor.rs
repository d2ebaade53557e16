//! Orchestrator execution logic

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::collector::{Collector, FinalReport, ProgressSnapshot};
use crate::config::RunConfig;
use crate::error::{BenchError, BenchResult};
use crate::generator::{generate, Bounded, GeneratorStats};
use crate::rate_limiter::{LimiterStats, RequestRateLimiter};
use crate::traits::{BackendFactory, RequestGenerator};
use crate::worker::WorkerPool;

use super::aggregator::{aggregate_worker_stats, AggregatedStats};

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Collector report
    pub report: FinalReport,
    /// Generation stage outcome
    pub generation: GeneratorStats,
    /// Admission counts, when a rate limit was configured
    pub limiter: Option<LimiterStats>,
    /// Per-worker counters merged
    pub workers: AggregatedStats,
    /// Whether the run was stopped early by the operator
    pub interrupted: bool,
}

/// Cancellation scopes of one run
///
/// `hard` is the root. `outer` (workers) is its child, and `window`
/// (generator) is the child of `outer`, so cancelling a scope also cancels
/// every scope nested inside it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    hard: CancellationToken,
    outer: CancellationToken,
    window: CancellationToken,
    interrupted: Arc<AtomicBool>,
}

impl ShutdownHandle {
    fn new() -> Self {
        let hard = CancellationToken::new();
        let outer = hard.child_token();
        let window = outer.child_token();
        Self {
            hard,
            outer,
            window,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop generating; in-flight and queued requests still drain
    pub fn shutdown(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.window.cancel();
    }

    /// Stop everything now, collector included
    pub fn abort(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.hard.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) or [`abort`](Self::abort) was called
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

/// Orchestrator manages the run lifecycle
///
/// Responsible for connecting workers, starting the pipeline stages,
/// arming the deadlines and joining everything into a [`RunSummary`].
pub struct Orchestrator {
    /// Run configuration
    pub(crate) config: RunConfig,

    /// Backend factory (one session per worker)
    pub(crate) factory: Arc<dyn BackendFactory>,

    /// Request generator, moved into the generation stage
    pub(crate) generator: Box<dyn RequestGenerator>,

    /// Progress snapshot sender
    pub(crate) snapshot_tx: mpsc::Sender<ProgressSnapshot>,

    /// Cancellation scopes
    pub(crate) shutdown: ShutdownHandle,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Use `OrchestratorBuilder` for a more ergonomic construction.
    pub fn new(
        config: RunConfig,
        factory: Arc<dyn BackendFactory>,
        generator: Box<dyn RequestGenerator>,
        snapshot_tx: mpsc::Sender<ProgressSnapshot>,
    ) -> Self {
        Self {
            config,
            factory,
            generator,
            snapshot_tx,
            shutdown: ShutdownHandle::new(),
        }
    }

    /// Get a handle that can stop the run from another task
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Get the run configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the benchmark
    ///
    /// Connects every worker first; the generation window starts only once
    /// all sessions are up. Stages are started consumers first (workers,
    /// collector, limiter, generator) and joined producers first.
    pub async fn run(self) -> BenchResult<RunSummary> {
        let Self {
            config,
            factory,
            generator,
            snapshot_tx,
            shutdown,
        } = self;

        tracing::info!(
            concurrency = config.concurrency,
            duration = ?config.duration,
            timeout = ?config.timeout,
            protocol = %config.protocol,
            rate_limit = ?config.rate_limit,
            max_requests = ?config.max_requests,
            "Connecting workers"
        );

        let pool = WorkerPool::connect(factory, config.concurrency, config.timeout).await?;

        let capacity = config.channels.request_capacity(config.concurrency);
        let (work_tx, work_rx) = async_channel::bounded(capacity);
        let (result_tx, result_rx) = mpsc::channel(config.channels.result_buffer.max(1));

        let workers = tokio::spawn(pool.run(shutdown.outer.clone(), work_rx, result_tx));

        let collector = Collector::new(config.protocol, config.snapshot_interval)
            .with_snapshots(snapshot_tx);
        let collector = tokio::spawn(collector.collect(shutdown.hard.clone(), result_rx));

        let (generated_tx, limiter) = match config.rate_limit {
            Some(limit) => {
                let limiter = RequestRateLimiter::new(limit)
                    .ok_or_else(|| BenchError::config("rate limit must be positive"))?;
                let (generated_tx, generated_rx) = async_channel::bounded(capacity);
                let handle =
                    tokio::spawn(async move { limiter.apply(generated_rx, work_tx).await });
                (generated_tx, Some(handle))
            }
            None => (work_tx, None),
        };

        let mut generator: Box<dyn RequestGenerator> = match config.max_requests {
            Some(max) => Box::new(Bounded::new(generator, max)),
            None => generator,
        };
        let window = shutdown.window.clone();
        let generation =
            tokio::spawn(async move { generate(&mut *generator, window, generated_tx).await });

        let timer = tokio::spawn(arm_deadlines(
            config.duration,
            config.hard_deadline(),
            shutdown.window.clone(),
            shutdown.outer.clone(),
        ));

        tracing::info!("Run started");

        let generation = join(generation, "generator").await?;
        tracing::debug!(generated = generation.generated, end = ?generation.end, "Generation finished");

        let limiter = match limiter {
            Some(handle) => Some(join(handle, "rate limiter").await?),
            None => None,
        };
        if let Some(stats) = &limiter {
            tracing::debug!(admitted = stats.admitted, dropped = stats.dropped, "Rate limiter finished");
        }

        let workers = join(workers, "worker pool").await.and_then(|stats| stats);
        let report = join(collector, "collector").await?;
        timer.abort();

        let workers = aggregate_worker_stats(&workers?);

        tracing::info!(
            responses = report.responses,
            errors = report.errors,
            rps = ?report.rate,
            "Run completed"
        );

        Ok(RunSummary {
            report,
            generation,
            limiter,
            workers,
            interrupted: shutdown.is_interrupted(),
        })
    }

    /// Run with Ctrl+C signal handling
    ///
    /// The first Ctrl+C stops generation and lets in-flight requests drain;
    /// a second one stops everything immediately.
    pub async fn run_with_signal_handling(self) -> BenchResult<RunSummary> {
        let shutdown = self.shutdown_handle();

        // Spawn signal handler task
        let signal_handle = tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }
            tracing::info!("Received Ctrl+C, draining in-flight requests (press again to abort)");
            shutdown.shutdown();

            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Received second Ctrl+C, aborting");
                shutdown.abort();
            }
        });

        let result = self.run().await;

        // Abort signal handler if still running
        signal_handle.abort();

        result
    }
}

/// Cancel `window` after `duration` and `outer` after `hard_deadline`
async fn arm_deadlines(
    duration: Duration,
    hard_deadline: Duration,
    window: CancellationToken,
    outer: CancellationToken,
) {
    let start = Instant::now();

    tokio::select! {
        _ = tokio::time::sleep_until(start + duration) => {
            tracing::info!("Generation window elapsed");
            window.cancel();
        }
        _ = window.cancelled() => {}
    }

    tokio::select! {
        _ = tokio::time::sleep_until(start + hard_deadline) => {
            tracing::debug!("Drain deadline reached, cancelling in-flight requests");
            outer.cancel();
        }
        _ = outer.cancelled() => {}
    }
}

async fn join<T>(handle: JoinHandle<T>, stage: &str) -> BenchResult<T> {
    handle
        .await
        .map_err(|e| BenchError::orchestration(format!("{} task failed: {}", stage, e)))
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("factory", &self.factory.name())
            .field("generator", &self.generator.name())
            .finish()
    }
}
