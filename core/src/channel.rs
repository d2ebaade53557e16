//! Queue sizing between pipeline stages

/// Channel buffer configuration for the pipeline
///
/// The request queue is kept small so that generation follows execution
/// closely and stops promptly at the deadline. The result queue is bounded
/// but large enough that a slow collector never stalls the workers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Request queue capacity (generator -> limiter -> workers).
    /// `None` sizes it to the worker count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_buffer: Option<usize>,

    /// Result queue capacity (workers -> collector)
    pub result_buffer: usize,

    /// Progress snapshot queue capacity (collector -> reporter)
    pub snapshot_buffer: usize,
}

/// Default result queue capacity
pub const DEFAULT_RESULT_BUFFER: usize = 1024 * 1024;

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            request_buffer: None,
            result_buffer: DEFAULT_RESULT_BUFFER,
            snapshot_buffer: 16,
        }
    }
}

impl ChannelConfig {
    /// Override the request queue capacity
    pub fn with_request_buffer(mut self, size: usize) -> Self {
        self.request_buffer = Some(size);
        self
    }

    /// Override the result queue capacity
    pub fn with_result_buffer(mut self, size: usize) -> Self {
        self.result_buffer = size;
        self
    }

    /// Request queue capacity for a pool of `concurrency` workers
    pub fn request_capacity(&self, concurrency: usize) -> usize {
        self.request_buffer.unwrap_or(concurrency).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_config_default() {
        let config = ChannelConfig::default();
        assert_eq!(config.result_buffer, DEFAULT_RESULT_BUFFER);
        assert_eq!(config.request_capacity(8), 8);
    }

    #[test]
    fn test_channel_config_builder() {
        let config = ChannelConfig::default()
            .with_result_buffer(5000)
            .with_request_buffer(0);
        assert_eq!(config.result_buffer, 5000);
        // zero-capacity queues are not supported by the request channel
        assert_eq!(config.request_capacity(8), 1);
    }
}
