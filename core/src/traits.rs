//! Core traits for backends and request generators
//!
//! These traits are defined in core so the pipeline never depends on wire
//! details. Implementations live in their respective crates (backends/,
//! generators/).

use crate::request::Request;
use crate::response::BackendResponse;
use async_trait::async_trait;
use std::sync::Arc;

// ============================================================================
// Backend Trait
// ============================================================================

/// Executor of one protocol, invoked by a worker
///
/// `execute` must fully consume the response (drain bodies) before
/// returning so the measured latency covers the whole exchange and the
/// connection can be reused.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend identifier (e.g., "http", "vector_search")
    fn name(&self) -> &str;

    /// Execute one request
    ///
    /// Recoverable failures (`Transport`, `Protocol`) are turned into error
    /// results by the worker. Fatal failures abort the run.
    async fn execute(&self, request: &Request) -> Result<BackendResponse, BackendError>;
}

/// Builds one backend session per worker
///
/// The worker pool awaits every `connect` call before any request is
/// admitted.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// Backend identifier
    fn name(&self) -> &str;

    /// Establish the session used by `worker_id`
    async fn connect(&self, worker_id: usize) -> Result<Arc<dyn Backend>, BackendError>;
}

/// Backend errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No response received (connection refused, reset, DNS failure)
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend rejected the call at the protocol level
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The request cannot be turned into a wire-level call
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request payload has the wrong shape for this backend
    #[error("unexpected payload: expected {expected}, got {found}")]
    UnexpectedPayload {
        /// Payload kind the backend understands
        expected: &'static str,
        /// Payload kind it received
        found: &'static str,
    },

    /// Backend session could not be built
    #[error("configuration error: {0}")]
    Config(String),
}

impl BackendError {
    /// Whether this error indicates a bug rather than a runtime condition
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BackendError::InvalidRequest(_)
                | BackendError::UnexpectedPayload { .. }
                | BackendError::Config(_)
        )
    }
}

// ============================================================================
// Request Generator Trait
// ============================================================================

/// Lazy source of requests
///
/// Shipped generators are infinite; `None` is reserved for bounded sources
/// (request caps, tests). Request ids are assigned by
/// [`generate`](crate::generator::generate), not by the implementation.
pub trait RequestGenerator: Send {
    /// Generator name for identification
    fn name(&self) -> &str;

    /// Produce the next request, or `None` when exhausted
    fn next_request(&mut self) -> Option<Request>;
}

impl<G: RequestGenerator + ?Sized> RequestGenerator for Box<G> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_request(&mut self) -> Option<Request> {
        (**self).next_request()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_fatal() {
        assert!(BackendError::InvalidRequest("bad url".into()).is_fatal());
        assert!(BackendError::UnexpectedPayload {
            expected: "vector_query",
            found: "none"
        }
        .is_fatal());
        assert!(BackendError::Config("bad dsn".into()).is_fatal());

        assert!(!BackendError::Transport("refused".into()).is_fatal());
        assert!(!BackendError::Protocol("not found".into()).is_fatal());
    }

    #[test]
    fn test_unexpected_payload_message() {
        let err = BackendError::UnexpectedPayload {
            expected: "vector_query",
            found: "none",
        };
        assert_eq!(
            err.to_string(),
            "unexpected payload: expected vector_query, got none"
        );
    }
}
