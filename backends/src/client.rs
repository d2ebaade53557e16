//! Pooled reqwest client construction shared by both backends

use std::time::Duration;

use reqwest::Client;
use stampede_core::{BackendError, RunConfig};

/// HTTP client configuration for one worker session.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// How long an idle connection is kept
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Client-level request timeout; unset when a worker owns the deadline
    pub request_timeout: Option<Duration>,

    /// Connection timeout; unset when a worker owns the deadline
    pub connect_timeout: Option<Duration>,

    /// TCP keepalive interval
    pub tcp_keepalive: Option<Duration>,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 1024,
            request_timeout: None,
            connect_timeout: None,
            tcp_keepalive: Some(Duration::from_secs(60)),
            user_agent: format!("stampede/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    /// Derive the client settings from a run configuration.
    ///
    /// No client-level timeouts are set: the worker's per-request deadline
    /// is the only timer, so an expired request is always reported as
    /// timed out rather than as a transport failure.
    pub fn from_run(config: &RunConfig) -> Self {
        Self::default().with_pool_max_idle(config.concurrency.max(1))
    }

    /// Create config with custom request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Create config with custom connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Create config with custom pool size.
    pub fn with_pool_max_idle(mut self, max_idle: usize) -> Self {
        self.pool_max_idle_per_host = max_idle;
        self
    }

    /// Build a client with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] if the TLS backend or resolver
    /// cannot be initialised.
    pub fn build_client(&self) -> Result<Client, BackendError> {
        let mut builder = Client::builder()
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .user_agent(&self.user_agent);

        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(keepalive) = self.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        builder
            .build()
            .map_err(|e| BackendError::Config(format!("could not build http client: {}", e)))
    }
}

/// Map a reqwest send error onto the backend error taxonomy.
///
/// Builder errors mean the request itself is malformed and can never
/// succeed; everything else is a transport condition.
pub(crate) fn classify_send_error(error: reqwest::Error) -> BackendError {
    if error.is_builder() {
        BackendError::InvalidRequest(error.to_string())
    } else {
        BackendError::Transport(error.to_string())
    }
}
