//! Run configuration types

use crate::channel::ChannelConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Backend protocol selected at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Plain HTTP requests
    #[default]
    Http,
    /// Vector-search queries (Qdrant query API)
    VectorSearch,
}

impl Protocol {
    /// Identifier used on the command line and in reports
    pub fn id(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::VectorSearch => "vector_search",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" | "https" => Ok(Protocol::Http),
            "qdrant" | "vector" | "vector_search" | "vector-search" => Ok(Protocol::VectorSearch),
            other => Err(ConfigError::UnknownProtocol(other.to_string())),
        }
    }
}

/// Token-bucket admission settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Sustained admission rate in requests per second
    pub rate: f64,
    /// Bucket capacity: the largest instantaneous burst admitted
    pub burst: u32,
}

impl RateLimit {
    /// Rate limit whose burst defaults to one second worth of tokens
    pub fn per_second(rate: f64) -> Self {
        let burst = if rate.is_finite() && rate > 0.0 {
            (rate.ceil() as u32).max(1)
        } else {
            1
        };
        Self { rate, burst }
    }

    /// Override the burst capacity
    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }
}

/// Load test configuration
///
/// Built once before the pipeline starts and shared read-only with every
/// stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of concurrent workers
    pub concurrency: usize,

    /// Per-request timeout; also the drain allowance after `duration`
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Generation window
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Base target address (HTTP URL, or vector-search DSN)
    pub target: String,

    /// Optional JSON file of request templates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Backend protocol
    pub protocol: Protocol,

    /// Optional token-bucket rate limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,

    /// Stop generating after this many requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_requests: Option<u64>,

    /// Seed for file-sampled generators
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Interval between progress snapshots
    #[serde(with = "humantime_serde")]
    pub snapshot_interval: Duration,

    /// Queue sizing
    pub channels: ChannelConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            timeout: Duration::from_secs(10),
            duration: Duration::from_secs(60),
            target: "http://localhost".to_string(),
            source: None,
            protocol: Protocol::Http,
            rate_limit: None,
            max_requests: None,
            seed: None,
            snapshot_interval: Duration::from_millis(500),
            channels: ChannelConfig::default(),
        }
    }
}

impl RunConfig {
    /// Create a new config with the given concurrency
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Default::default()
        }
    }

    /// Set the generation window
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the target address
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Set the rate limit
    pub fn with_rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    /// Set the request-count cap
    pub fn with_max_requests(mut self, max: u64) -> Self {
        self.max_requests = Some(max);
        self
    }

    /// Set the backend protocol
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Outer safety-net deadline: `duration + timeout`
    pub fn hard_deadline(&self) -> Duration {
        self.duration.saturating_add(self.timeout)
    }

    /// Parse `target` as a URL
    pub fn target_url(&self) -> Result<url::Url, ConfigError> {
        let url = url::Url::parse(&self.target)
            .map_err(|e| ConfigError::InvalidTarget(format!("{}: {}", self.target, e)))?;
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidTarget(format!(
                "{}: missing host",
                self.target
            )));
        }
        Ok(url)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(
                "concurrency must be at least 1".into(),
            ));
        }

        if self.duration.is_zero() {
            return Err(ConfigError::InvalidDuration("duration must be positive".into()));
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidDuration("timeout must be positive".into()));
        }

        if self.snapshot_interval.is_zero() {
            return Err(ConfigError::InvalidDuration(
                "snapshot interval must be positive".into(),
            ));
        }

        if let Some(limit) = self.rate_limit {
            if !limit.rate.is_finite() || limit.rate <= 0.0 {
                return Err(ConfigError::InvalidRateLimit(
                    "rate limit must be positive".into(),
                ));
            }
            if limit.burst == 0 {
                return Err(ConfigError::InvalidRateLimit(
                    "burst must be at least 1".into(),
                ));
            }
        }

        if self.max_requests == Some(0) {
            return Err(ConfigError::InvalidStopCondition(
                "request count must be at least 1".into(),
            ));
        }

        let url = self.target_url()?;
        if self.protocol == Protocol::VectorSearch && url.port().is_none() {
            return Err(ConfigError::InvalidTarget(format!(
                "{}: vector-search target needs an explicit port",
                self.target
            )));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid concurrency value
    #[error("Invalid concurrency: {0}")]
    InvalidConcurrency(String),

    /// Invalid duration, timeout or interval
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Invalid rate limit
    #[error("Invalid rate limit: {0}")]
    InvalidRateLimit(String),

    /// Invalid stop condition
    #[error("Invalid stop condition: {0}")]
    InvalidStopCondition(String),

    /// Unparsable target address
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Unknown backend protocol name
    #[error("Unknown load type: {0}")]
    UnknownProtocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.duration, Duration::from_secs(60));
        assert_eq!(config.target, "http://localhost");
        assert!(config.rate_limit.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_pattern() {
        let config = RunConfig::new(10)
            .with_duration(Duration::from_secs(2))
            .with_timeout(Duration::from_secs(1))
            .with_rate_limit(RateLimit::per_second(100.0));

        assert_eq!(config.concurrency, 10);
        assert_eq!(config.hard_deadline(), Duration::from_secs(3));
        assert_eq!(config.rate_limit.map(|l| l.burst), Some(100));
    }

    #[test]
    fn test_config_validation_zero_concurrency() {
        let config = RunConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConcurrency(_))
        ));
    }

    #[test]
    fn test_config_validation_rate_limit() {
        let negative = RunConfig::new(1).with_rate_limit(RateLimit::per_second(-10.0));
        assert!(negative.validate().is_err());

        let nan = RunConfig::new(1).with_rate_limit(RateLimit::per_second(f64::NAN));
        assert!(nan.validate().is_err());

        let zero_burst = RunConfig::new(1).with_rate_limit(RateLimit::per_second(5.0).with_burst(0));
        assert!(zero_burst.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_request_count() {
        let config = RunConfig::new(1).with_max_requests(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidStopCondition(_))
        ));
    }

    #[test]
    fn test_config_validation_bad_target() {
        let config = RunConfig::new(1).with_target("not a url");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTarget(_))));
    }

    #[test]
    fn test_vector_search_needs_port() {
        let config = RunConfig::new(1)
            .with_protocol(Protocol::VectorSearch)
            .with_target("http://localhost");
        assert!(config.validate().is_err());

        let config = config.with_target("http://localhost:6333");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("http".parse::<Protocol>().unwrap(), Protocol::Http);
        assert_eq!("qdrant".parse::<Protocol>().unwrap(), Protocol::VectorSearch);
        assert_eq!(
            "Vector-Search".parse::<Protocol>().unwrap(),
            Protocol::VectorSearch
        );
        assert!(matches!(
            "grpc".parse::<Protocol>(),
            Err(ConfigError::UnknownProtocol(_))
        ));
    }

    #[test]
    fn test_rate_limit_fractional_burst() {
        let limit = RateLimit::per_second(0.5);
        assert_eq!(limit.burst, 1);
        let limit = RateLimit::per_second(2.5);
        assert_eq!(limit.burst, 3);
    }

    #[test]
    fn test_config_deserialize_partial() {
        let json = r#"{"concurrency": 4, "duration": "2s", "timeout": "1s", "protocol": "vector_search", "target": "http://qdrant:6333"}"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.concurrency, 4);
        assert_eq!(config.duration, Duration::from_secs(2));
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.protocol, Protocol::VectorSearch);
        // untouched fields keep their defaults
        assert_eq!(config.snapshot_interval, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }
}
