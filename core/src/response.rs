//! Outcome and result types emitted by workers

use crate::request::RequestId;
use std::time::Duration;

/// Classification of one completed execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A response with this status code was received
    Status(u16),
    /// The protocol call succeeded (protocols without status codes)
    Completed,
    /// No response was received
    TransportError(String),
    /// The backend answered with a protocol-level error
    ProtocolError(String),
    /// The per-request scope expired
    TimedOut,
    /// The outer scope fired before or during the call
    Cancelled,
}

impl Outcome {
    /// Whether the request succeeded
    pub fn is_success(&self) -> bool {
        match self {
            Outcome::Status(code) => (200..300).contains(code),
            Outcome::Completed => true,
            _ => false,
        }
    }

    /// Whether the request produced no usable response
    ///
    /// Non-2xx statuses are failures but not errors: the target answered.
    pub fn is_error(&self) -> bool {
        !matches!(self, Outcome::Status(_) | Outcome::Completed)
    }

    /// Status code for per-status accounting; `0` when none was received
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Status(code) => *code,
            _ => 0,
        }
    }

    /// Outcome class used as the breakdown key
    pub fn class(&self) -> String {
        match self {
            Outcome::Status(code) => format!("status_{}", code),
            Outcome::Completed => "completed".to_string(),
            Outcome::TransportError(_) => "transport_error".to_string(),
            Outcome::ProtocolError(_) => "protocol_error".to_string(),
            Outcome::TimedOut => "timed_out".to_string(),
            Outcome::Cancelled => "cancelled".to_string(),
        }
    }

    /// Error description, if any
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Outcome::TransportError(msg) | Outcome::ProtocolError(msg) => Some(msg),
            Outcome::TimedOut => Some("request timed out"),
            Outcome::Cancelled => Some("request cancelled"),
            Outcome::Status(_) | Outcome::Completed => None,
        }
    }
}

/// Protocol-specific data attached to a result
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ResultPayload {
    /// Nothing to accumulate
    #[default]
    None,
    /// Vector-search hits
    Search {
        /// Number of points returned
        points: usize,
        /// Highest score among returned points (0 when none)
        best_score: f32,
    },
}

/// What a backend returns for one executed request
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    /// Outcome classification
    pub outcome: Outcome,
    /// Protocol-specific data
    pub payload: ResultPayload,
}

impl BackendResponse {
    /// Response carrying an HTTP status
    pub fn status(code: u16) -> Self {
        Self {
            outcome: Outcome::Status(code),
            payload: ResultPayload::None,
        }
    }

    /// Successful search response
    pub fn search(points: usize, best_score: f32) -> Self {
        Self {
            outcome: Outcome::Completed,
            payload: ResultPayload::Search { points, best_score },
        }
    }
}

/// One result per executed request, created by the worker
#[derive(Debug, Clone, PartialEq)]
pub struct RequestResult {
    /// Request this result belongs to
    pub request_id: RequestId,

    /// Worker that executed it
    pub worker_id: usize,

    /// Wall time from dispatch to completion (body drain included)
    pub latency: Duration,

    /// Outcome classification
    pub outcome: Outcome,

    /// Protocol-specific data
    pub payload: ResultPayload,
}

impl RequestResult {
    /// Whether the request succeeded
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Whether the request produced no usable response
    pub fn is_error(&self) -> bool {
        self.outcome.is_error()
    }
}
