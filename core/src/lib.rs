//! stampede-core: Pipeline engine for protocol-pluggable load generation
//!
//! This crate provides everything between "a source of requests" and "a
//! report", independent of any wire protocol:
//!
//! - Protocol-neutral request and result types
//! - Core traits (Backend, BackendFactory, RequestGenerator)
//! - The pipeline stages: generation, rate limiting, worker pool, collection
//! - The orchestrator that wires the stages and owns the deadlines
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod collector;
pub mod config;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod rate_limiter;
pub mod request;
pub mod response;
pub mod traits;
pub mod worker;

pub use channel::ChannelConfig;
pub use collector::{Collector, FinalReport, ProgressSnapshot, RunningStats, SearchSummary};
pub use config::{ConfigError, Protocol, RateLimit, RunConfig};
pub use error::*;
pub use generator::{generate, Bounded, GenerationEnd, GeneratorStats};
pub use orchestrator::{
    aggregate_worker_stats, AggregatedStats, Orchestrator, OrchestratorBuilder, RunSummary,
    ShutdownHandle,
};
pub use rate_limiter::{LimiterStats, RequestRateLimiter};
pub use request::*;
pub use response::*;
pub use traits::*;
pub use worker::{Worker, WorkerBuilder, WorkerPool, WorkerStats};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_config_from_json_file_contents() {
        let json = r#"{
            "concurrency": 8,
            "timeout": "2s",
            "duration": "30s",
            "target": "http://localhost:6333",
            "protocol": "vector_search",
            "rate_limit": { "rate": 100.0, "burst": 20 }
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.concurrency, 8);
        assert_eq!(config.hard_deadline(), Duration::from_secs(32));
        assert_eq!(config.protocol, Protocol::VectorSearch);
        assert!(RequestRateLimiter::new(config.rate_limit.unwrap()).is_some());
    }

    #[test]
    fn test_config_error_converts_to_bench_error() {
        let config = RunConfig::new(0);
        let err: BenchError = config.validate().unwrap_err().into();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn test_vector_request_reports_payload_kind() {
        let query = VectorQuery::new("my_collection", vec![0.1, 0.2]);
        let request = Request::vector_query("localhost:6334", std::sync::Arc::new(query));
        assert_eq!(request.payload.kind(), "vector_query");
        assert_eq!(request.method, "POST");
    }
}
