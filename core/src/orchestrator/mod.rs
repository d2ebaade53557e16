//! Orchestrator for the run lifecycle
//!
//! The Orchestrator wires the pipeline stages together:
//! - Connecting one backend session per worker (readiness barrier)
//! - Starting workers, collector, rate limiter and generator in that order
//! - Arming the generation window and the outer drain deadline
//! - Joining every stage and producing the [`RunSummary`]
//!
//! # Example
//!
//! ```ignore
//! use stampede_core::{OrchestratorBuilder, RunConfig};
//!
//! let (orchestrator, snapshots_rx) = OrchestratorBuilder::new()
//!     .config(RunConfig::new(4))
//!     .factory(factory)
//!     .generator(generator)
//!     .build()?;
//!
//! let summary = orchestrator.run_with_signal_handling().await?;
//! println!("{}", summary.report);
//! ```

mod aggregator;
mod builder;
mod executor;

pub use aggregator::{aggregate_worker_stats, AggregatedStats};
pub use builder::OrchestratorBuilder;
pub use executor::{Orchestrator, RunSummary, ShutdownHandle};
