//! Request types produced by generators and consumed by workers

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Sequence number assigned in emission order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A single unit of work
///
/// Immutable once produced. HTTP backends read `target`, `method` and
/// `body`; protocol backends read the pre-built `payload`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Sequence number, assigned by the generation driver
    pub id: RequestId,

    /// Full target address
    pub target: String,

    /// HTTP method
    pub method: String,

    /// Request body
    pub body: Option<String>,

    /// Protocol-specific pre-built query
    pub payload: RequestPayload,

    /// Optional per-request deadline, capped by the configured timeout
    pub deadline: Option<Duration>,
}

impl Request {
    /// Create a plain request
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: RequestId::default(),
            target: target.into(),
            method: method.into(),
            body: None,
            payload: RequestPayload::None,
            deadline: None,
        }
    }

    /// Create a `GET` request
    pub fn get(target: impl Into<String>) -> Self {
        Self::new("GET", target)
    }

    /// Create a vector-search request
    pub fn vector_query(target: impl Into<String>, query: Arc<VectorQuery>) -> Self {
        Self {
            payload: RequestPayload::VectorQuery(query),
            ..Self::new("POST", target)
        }
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the per-request deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Effective timeout for this request
    pub fn effective_timeout(&self, configured: Duration) -> Duration {
        self.deadline
            .map(|d| d.min(configured))
            .unwrap_or(configured)
    }
}

/// Protocol-specific payload carried by a request
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestPayload {
    /// No pre-built payload (plain HTTP)
    #[default]
    None,
    /// Pre-translated vector-search query
    VectorQuery(Arc<VectorQuery>),
}

impl RequestPayload {
    /// Short name used in contract-violation messages
    pub fn kind(&self) -> &'static str {
        match self {
            RequestPayload::None => "none",
            RequestPayload::VectorQuery(_) => "vector_query",
        }
    }
}

/// Fully-formed nearest-neighbour query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    /// Collection name
    pub collection: String,

    /// Query vector
    pub vector: Vec<f32>,

    /// Must-match filter conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<MatchCondition>,

    /// Search parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<SearchParams>,

    /// Maximum number of points to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    /// Return point payloads
    #[serde(default)]
    pub with_payload: bool,

    /// Return point vectors
    #[serde(default)]
    pub with_vectors: bool,

    /// Numeric shard keys to route to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shard_keys: Vec<u64>,
}

impl VectorQuery {
    /// Create a query against `collection`
    pub fn new(collection: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            collection: collection.into(),
            vector,
            filter: Vec::new(),
            params: None,
            limit: None,
            with_payload: false,
            with_vectors: false,
            shard_keys: Vec::new(),
        }
    }
}

/// Integer equality condition on a payload field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCondition {
    /// Payload field
    pub field: String,
    /// Value to match
    pub value: i64,
}

/// Index search parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// HNSW beam size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hnsw_ef: Option<u64>,

    /// Exhaustive search
    #[serde(default)]
    pub exact: bool,

    /// Only search indexed segments
    #[serde(default)]
    pub indexed_only: bool,

    /// Quantization behaviour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<QuantizationParams>,
}

/// Quantized search parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizationParams {
    /// Re-score candidates with original vectors
    pub rescore: bool,
    /// Candidate oversampling factor
    pub oversampling: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req = Request::get("http://localhost/health");
        assert_eq!(req.method, "GET");
        assert_eq!(req.payload, RequestPayload::None);
        assert!(req.body.is_none());
        assert!(req.deadline.is_none());
    }

    #[test]
    fn test_effective_timeout() {
        let configured = Duration::from_secs(1);
        let req = Request::get("http://localhost");
        assert_eq!(req.effective_timeout(configured), configured);

        let shorter = req.clone().with_deadline(Duration::from_millis(200));
        assert_eq!(
            shorter.effective_timeout(configured),
            Duration::from_millis(200)
        );

        let longer = req.with_deadline(Duration::from_secs(5));
        assert_eq!(longer.effective_timeout(configured), configured);
    }

    #[test]
    fn test_vector_query_request() {
        let query = Arc::new(VectorQuery::new("items", vec![0.1, 0.2]));
        let req = Request::vector_query("http://localhost:6333", Arc::clone(&query));
        assert_eq!(req.payload.kind(), "vector_query");
        match req.payload {
            RequestPayload::VectorQuery(q) => assert_eq!(q.collection, "items"),
            RequestPayload::None => panic!("Expected VectorQuery payload"),
        }
    }

    #[test]
    fn test_search_params_skip_empty() {
        let params = SearchParams::default();
        let json = serde_json::to_string(&params).unwrap();
        assert!(!json.contains("hnsw_ef"));
        assert!(!json.contains("quantization"));
    }
}
