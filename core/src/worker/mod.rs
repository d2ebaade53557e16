//! Worker pool for executing requests against a backend
//!
//! Each Worker is a tokio task running the loop **pull -> execute ->
//! report -> repeat**:
//!
//! 1. Pulls the next request from the shared request queue
//! 2. Executes it against its own backend session, bounded by the
//!    per-request timeout and the outer cancellation scope
//! 3. Sends exactly one [`RequestResult`](crate::response::RequestResult)
//!    to the collector
//! 4. Repeats until the request queue reaches end-of-stream
//!
//! The [`WorkerPool`] owns construction (a readiness barrier over every
//! backend session) and joins all workers before returning, which is what
//! closes the result queue.
//!
//! # Example
//!
//! ```ignore
//! use stampede_core::worker::WorkerPool;
//!
//! let pool = WorkerPool::connect(factory, 4, Duration::from_secs(1)).await?;
//! let stats = pool.run(cancel, requests_rx, results_tx).await?;
//! ```

mod builder;
mod executor;
mod pool;
mod stats;

pub use builder::WorkerBuilder;
pub use executor::Worker;
pub use pool::WorkerPool;
pub use stats::WorkerStats;

#[cfg(test)]
mod tests;
