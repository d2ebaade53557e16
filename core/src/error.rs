//! Error types for stampede-core

use thiserror::Error;

/// Core error type
///
/// Every variant here is fatal for the run: recoverable per-request failures
/// never become a `BenchError`, they travel through the pipeline as
/// [`Outcome`](crate::response::Outcome) data instead.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A required builder field was never set
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// The request source could not be loaded
    #[error("request source error: {0}")]
    Source(String),

    /// A worker could not establish its backend session
    #[error("worker {worker_id} could not connect to backend: {message}")]
    Connect {
        /// Worker that failed
        worker_id: usize,
        /// Backend error description
        message: String,
    },

    /// Contract violation detected while executing (malformed request,
    /// payload of the wrong shape for the backend)
    #[error("fatal error: {0}")]
    Fatal(String),

    /// Pipeline coordination failure (task panicked, stage vanished)
    #[error("orchestration error: {0}")]
    Orchestration(String),
}

impl BenchError {
    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Missing builder field
    pub fn missing_config(field: &'static str) -> Self {
        Self::MissingConfig(field)
    }

    /// Request source error
    pub fn source(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }

    /// Backend construction error for a worker
    pub fn connect(worker_id: usize, message: impl Into<String>) -> Self {
        Self::Connect {
            worker_id,
            message: message.into(),
        }
    }

    /// Fatal contract violation
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Orchestration failure
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::Orchestration(message.into())
    }
}

impl From<crate::config::ConfigError> for BenchError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_message() {
        let err = BenchError::missing_config("backend");
        assert_eq!(err.to_string(), "missing required configuration: backend");
    }

    #[test]
    fn test_connect_message_names_worker() {
        let err = BenchError::connect(3, "connection refused");
        let msg = err.to_string();
        assert!(msg.contains("worker 3"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: BenchError =
            crate::config::ConfigError::InvalidConcurrency("must be at least 1".into()).into();
        assert!(matches!(err, BenchError::Config(_)));
    }
}
