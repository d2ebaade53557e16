//! Plain HTTP backend

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method};
use stampede_core::{
    Backend, BackendError, BackendFactory, BackendResponse, Request, RequestPayload,
};
use url::Url;

use crate::client::{classify_send_error, HttpConfig};

/// Creates one [`HttpBackend`] per worker, each with its own connection pool
#[derive(Debug, Clone)]
pub struct HttpFactory {
    config: HttpConfig,
}

impl HttpFactory {
    /// Create a factory that builds clients from `config`
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BackendFactory for HttpFactory {
    fn name(&self) -> &str {
        "http"
    }

    async fn connect(&self, worker_id: usize) -> Result<Arc<dyn Backend>, BackendError> {
        let client = self.config.build_client()?;
        tracing::debug!(worker_id, "HTTP client ready");
        Ok(Arc::new(HttpBackend::new(client)))
    }
}

/// Issues each request as-is and reports its status code
///
/// The response body is read to the end and discarded so the connection
/// can be reused.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
}

impl HttpBackend {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, request: &Request) -> Result<BackendResponse, BackendError> {
        if !matches!(request.payload, RequestPayload::None) {
            return Err(BackendError::UnexpectedPayload {
                expected: RequestPayload::None.kind(),
                found: request.payload.kind(),
            });
        }

        let method = Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            BackendError::InvalidRequest(format!("invalid method {:?}", request.method))
        })?;
        let url = Url::parse(&request.target).map_err(|e| {
            BackendError::InvalidRequest(format!("invalid url {}: {}", request.target, e))
        })?;

        let mut builder = self.client.request(method, url);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(classify_send_error)?;
        let status = response.status().as_u16();

        // drain so the connection goes back to the pool
        response
            .bytes()
            .await
            .map_err(|e| BackendError::Transport(format!("reading body: {}", e)))?;

        Ok(BackendResponse::status(status))
    }
}
