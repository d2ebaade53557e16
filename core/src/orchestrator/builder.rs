//! Builder pattern for Orchestrator construction

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::collector::ProgressSnapshot;
use crate::config::{RateLimit, RunConfig};
use crate::error::{BenchError, BenchResult};
use crate::traits::{BackendFactory, RequestGenerator};

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with proper configuration
///
/// # Example
///
/// ```ignore
/// let (orchestrator, snapshots_rx) = OrchestratorBuilder::new()
///     .concurrency(10)
///     .duration(Duration::from_secs(30))
///     .rate_limit(Some(RateLimit::per_second(100.0)))
///     .factory(factory)
///     .generator(generator)
///     .build()?;
/// ```
pub struct OrchestratorBuilder {
    config: RunConfig,
    factory: Option<Arc<dyn BackendFactory>>,
    generator: Option<Box<dyn RequestGenerator>>,
}

impl OrchestratorBuilder {
    /// Create a new orchestrator builder with default configuration
    pub fn new() -> Self {
        Self {
            config: RunConfig::default(),
            factory: None,
            generator: None,
        }
    }

    /// Set the full run configuration
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the worker count
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set the generation window
    pub fn duration(mut self, duration: Duration) -> Self {
        self.config.duration = duration;
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the rate limit
    pub fn rate_limit(mut self, limit: Option<RateLimit>) -> Self {
        self.config.rate_limit = limit;
        self
    }

    /// Cap the number of generated requests
    pub fn max_requests(mut self, max: Option<u64>) -> Self {
        self.config.max_requests = max;
        self
    }

    /// Set the backend factory
    pub fn factory(mut self, factory: Arc<dyn BackendFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set the request generator
    pub fn generator(mut self, generator: impl RequestGenerator + 'static) -> Self {
        self.generator = Some(Box::new(generator));
        self
    }

    /// Set an already boxed request generator
    pub fn boxed_generator(mut self, generator: Box<dyn RequestGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the orchestrator and return it along with the snapshot receiver
    ///
    /// # Errors
    ///
    /// Returns an error if the factory or generator are not set, or if
    /// configuration validation fails.
    pub fn build(self) -> BenchResult<(Orchestrator, mpsc::Receiver<ProgressSnapshot>)> {
        let factory = self
            .factory
            .ok_or_else(|| BenchError::missing_config("factory"))?;

        let generator = self
            .generator
            .ok_or_else(|| BenchError::missing_config("generator"))?;

        self.config.validate()?;

        let (snapshot_tx, snapshot_rx) =
            mpsc::channel(self.config.channels.snapshot_buffer.max(1));

        let orchestrator = Orchestrator::new(self.config, factory, generator, snapshot_tx);

        Ok((orchestrator, snapshot_rx))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
