//! Vector-search backend speaking the Qdrant REST query API
//!
//! Each [`VectorQuery`] becomes one
//! `POST {base}/collections/{collection}/points/query` call. A successful
//! call is reported as [`Outcome::Completed`](stampede_core::Outcome) with
//! the number of points returned and the best score among them.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use stampede_core::{
    Backend, BackendError, BackendFactory, BackendResponse, QuantizationParams, Request,
    RequestPayload, SearchParams, VectorQuery,
};
use url::Url;

use crate::client::{classify_send_error, HttpConfig};

/// Longest error body echoed into a protocol error
const MAX_ERROR_BODY: usize = 256;

/// Creates one [`VectorSearchBackend`] per worker
#[derive(Debug, Clone)]
pub struct VectorSearchFactory {
    base: Url,
    config: HttpConfig,
}

impl VectorSearchFactory {
    /// Create a factory for the service at `base` (scheme, host and port)
    pub fn new(base: Url, config: HttpConfig) -> Self {
        Self { base, config }
    }
}

#[async_trait]
impl BackendFactory for VectorSearchFactory {
    fn name(&self) -> &str {
        "vector_search"
    }

    async fn connect(&self, worker_id: usize) -> Result<Arc<dyn Backend>, BackendError> {
        let client = self.config.build_client()?;
        tracing::debug!(worker_id, base = %self.base, "Vector-search client ready");
        Ok(Arc::new(VectorSearchBackend::new(self.base.clone(), client)))
    }
}

/// Executes vector queries against one service
#[derive(Debug, Clone)]
pub struct VectorSearchBackend {
    base: Url,
    client: Client,
}

impl VectorSearchBackend {
    /// Create a backend over an existing client
    pub fn new(base: Url, client: Client) -> Self {
        Self { base, client }
    }

    fn query_url(&self, collection: &str) -> Result<Url, BackendError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                BackendError::InvalidRequest(format!("{} cannot be a base url", self.base))
            })?
            .pop_if_empty()
            .extend(["collections", collection, "points", "query"]);
        Ok(url)
    }
}

#[async_trait]
impl Backend for VectorSearchBackend {
    fn name(&self) -> &str {
        "vector_search"
    }

    async fn execute(&self, request: &Request) -> Result<BackendResponse, BackendError> {
        let RequestPayload::VectorQuery(query) = &request.payload else {
            return Err(BackendError::UnexpectedPayload {
                expected: "vector_query",
                found: request.payload.kind(),
            });
        };

        let url = self.query_url(&query.collection)?;
        let response = self
            .client
            .post(url)
            .json(&QueryBody::from(query.as_ref()))
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| BackendError::Transport(format!("reading body: {}", e)))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let text: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(BackendError::Protocol(format!(
                "status {}: {}",
                status.as_u16(),
                text
            )));
        }

        let parsed: QueryResponse = serde_json::from_slice(&body)
            .map_err(|e| BackendError::Protocol(format!("malformed query response: {}", e)))?;
        let points = parsed.result.points;

        let best_score = points
            .iter()
            .map(|point| point.score)
            .fold(None, |best: Option<f32>, score| {
                Some(best.map_or(score, |b| b.max(score)))
            })
            .unwrap_or(0.0);

        Ok(BackendResponse::search(points.len(), best_score))
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query: &'a [f32],
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Filter<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Params>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
    with_payload: bool,
    with_vector: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    shard_key: Option<&'a [u64]>,
}

#[derive(Debug, Serialize)]
struct Filter<'a> {
    must: Vec<FieldCondition<'a>>,
}

#[derive(Debug, Serialize)]
struct FieldCondition<'a> {
    key: &'a str,
    #[serde(rename = "match")]
    matches: MatchValue,
}

#[derive(Debug, Serialize)]
struct MatchValue {
    value: i64,
}

#[derive(Debug, Serialize)]
struct Params {
    #[serde(skip_serializing_if = "Option::is_none")]
    hnsw_ef: Option<u64>,
    exact: bool,
    indexed_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantization: Option<Quantization>,
}

#[derive(Debug, Serialize)]
struct Quantization {
    rescore: bool,
    oversampling: f64,
}

impl<'a> From<&'a VectorQuery> for QueryBody<'a> {
    fn from(query: &'a VectorQuery) -> Self {
        let filter = (!query.filter.is_empty()).then(|| Filter {
            must: query
                .filter
                .iter()
                .map(|condition| FieldCondition {
                    key: &condition.field,
                    matches: MatchValue {
                        value: condition.value,
                    },
                })
                .collect(),
        });

        Self {
            query: &query.vector,
            filter,
            params: query.params.as_ref().map(Params::from),
            limit: query.limit,
            with_payload: query.with_payload,
            with_vector: query.with_vectors,
            shard_key: (!query.shard_keys.is_empty()).then_some(query.shard_keys.as_slice()),
        }
    }
}

impl From<&SearchParams> for Params {
    fn from(params: &SearchParams) -> Self {
        Self {
            hnsw_ef: params.hnsw_ef,
            exact: params.exact,
            indexed_only: params.indexed_only,
            quantization: params
                .quantization
                .map(|QuantizationParams { rescore, oversampling }| Quantization {
                    rescore,
                    oversampling,
                }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    points: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    #[serde(default)]
    score: f32,
}
