//! Request generators for the stampede load generator
//!
//! This crate provides implementations of the `RequestGenerator` trait for:
//!
//! - Fixed repetition of the base request
//! - File-sampled HTTP templates
//! - File-sampled vector-search queries
//!
//! plus synthesis of sample vector query files.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod fixed;
pub mod sample;
pub mod template;
pub mod vector_query;

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use stampede_core::{Protocol, Request, RequestGenerator, RunConfig};

pub use error::SourceError;
pub use fixed::FixedGenerator;
pub use sample::{sample_queries, write_sample_queries, SampleSpec};
pub use template::{HttpTemplate, TemplateGenerator};
pub use vector_query::{QueryTemplate, VectorQueryGenerator};

/// Build the generator selected by the configuration
///
/// HTTP runs repeat a `GET` of the target unless a request file is given;
/// vector-search runs always sample from a query file.
///
/// # Errors
///
/// Returns a [`SourceError`] if the request file cannot be loaded.
pub fn build_generator(config: &RunConfig) -> Result<Box<dyn RequestGenerator>, SourceError> {
    let source = config.source.as_deref();

    match (config.protocol, source) {
        (Protocol::Http, None) => {
            Ok(Box::new(FixedGenerator::new(Request::get(&config.target))))
        }
        (Protocol::Http, Some(path)) => {
            let base = Request::get(&config.target);
            Ok(Box::new(TemplateGenerator::from_file(
                path,
                &base,
                config.seed,
            )?))
        }
        (Protocol::VectorSearch, Some(path)) => Ok(Box::new(VectorQueryGenerator::from_file(
            path,
            &config.target,
            config.seed,
        )?)),
        (Protocol::VectorSearch, None) => Err(SourceError::Required(config.protocol.id())),
    }
}

/// Read a JSON array of entries from `path`
pub(crate) fn load_entries<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SourceError> {
    let bytes = std::fs::read(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: Vec<serde_json::Value> =
        serde_json::from_slice(&bytes).map_err(|source| SourceError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if raw.is_empty() {
        return Err(SourceError::Empty {
            path: path.to_path_buf(),
        });
    }
    raw.into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value).map_err(|err| SourceError::entry(index, err.to_string()))
        })
        .collect()
}

/// Seeded when a seed is given, entropy otherwise
pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_http_without_source_is_fixed() {
        let config = RunConfig::new(1).with_target("http://localhost/health");
        let mut generator = build_generator(&config).unwrap();
        assert_eq!(generator.name(), "fixed");
        assert_eq!(
            generator.next_request().unwrap().target,
            "http://localhost/health"
        );
    }

    #[test]
    fn test_http_with_source_samples_templates() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"path": "/a"}}]"#).unwrap();
        let mut config = RunConfig::new(1);
        config.source = Some(file.path().to_path_buf());

        let mut generator = build_generator(&config).unwrap();
        assert_eq!(generator.name(), "from_json");
        assert_eq!(generator.next_request().unwrap().target, "http://localhost/a");
    }

    #[test]
    fn test_vector_search_requires_source() {
        let config = RunConfig::new(1)
            .with_protocol(Protocol::VectorSearch)
            .with_target("http://localhost:6333");
        assert!(matches!(
            build_generator(&config),
            Err(SourceError::Required("vector_search"))
        ));
    }
}
