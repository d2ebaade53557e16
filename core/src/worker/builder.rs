//! Builder pattern for Worker construction

use crate::error::{BenchError, BenchResult};
use crate::traits::Backend;

use super::executor::Worker;

use std::sync::Arc;
use std::time::Duration;

/// Builder for creating Worker instances
///
/// # Example
/// ```ignore
/// let worker = WorkerBuilder::new(0)
///     .backend(backend)
///     .timeout(Duration::from_secs(1))
///     .build()?;
/// ```
pub struct WorkerBuilder {
    id: usize,
    backend: Option<Arc<dyn Backend>>,
    timeout: Option<Duration>,
}

impl WorkerBuilder {
    /// Create a new builder with the given worker ID
    pub fn new(id: usize) -> Self {
        Self {
            id,
            backend: None,
            timeout: None,
        }
    }

    /// Set the backend session
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the Worker
    ///
    /// # Errors
    /// Returns an error if any required field is missing or the timeout is zero.
    pub fn build(self) -> BenchResult<Worker> {
        let backend = self.backend.ok_or(BenchError::missing_config("backend"))?;
        let timeout = self.timeout.ok_or(BenchError::missing_config("timeout"))?;
        if timeout.is_zero() {
            return Err(BenchError::config("worker timeout must be positive"));
        }

        Ok(Worker::new(self.id, backend, timeout))
    }
}
