//! Backend implementations for the stampede load generator
//!
//! This crate provides implementations of the `Backend` and
//! `BackendFactory` traits for:
//!
//! - Plain HTTP (any method, optional body, status code reported)
//! - Vector search (Qdrant REST query API)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod http;
pub mod vector;

use std::sync::Arc;

use stampede_core::{BackendError, BackendFactory, Protocol, RunConfig};

pub use client::HttpConfig;
pub use http::{HttpBackend, HttpFactory};
pub use vector::{VectorSearchBackend, VectorSearchFactory};

/// Select the backend factory for the configured protocol.
///
/// # Errors
///
/// Returns [`BackendError::Config`] if the target cannot serve as a base
/// address for the selected protocol.
pub fn factory_for(config: &RunConfig) -> Result<Arc<dyn BackendFactory>, BackendError> {
    let http = HttpConfig::from_run(config);

    match config.protocol {
        Protocol::Http => Ok(Arc::new(HttpFactory::new(http))),
        Protocol::VectorSearch => {
            let base = config
                .target_url()
                .map_err(|e| BackendError::Config(e.to_string()))?;
            if base.port().is_none() {
                return Err(BackendError::Config(format!(
                    "{}: vector-search target needs an explicit port",
                    config.target
                )));
            }
            Ok(Arc::new(VectorSearchFactory::new(base, http)))
        }
    }
}
