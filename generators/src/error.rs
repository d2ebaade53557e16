//! Request source errors

use std::path::PathBuf;

use stampede_core::BenchError;

/// Errors raised while loading a request source
///
/// All of these surface at construction time; a generator that was built
/// successfully never fails afterwards.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source file could not be read
    #[error("could not read {}: {source}", path.display())]
    Io {
        /// Source path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The source file is not a JSON array of entries
    #[error("could not parse {}: {source}", path.display())]
    Parse {
        /// Source path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// The source file holds no entries
    #[error("{} contains no requests", path.display())]
    Empty {
        /// Source path
        path: PathBuf,
    },

    /// One entry is malformed
    #[error("wrong request {index}: {reason}")]
    InvalidEntry {
        /// Zero-based position of the entry in the file
        index: usize,
        /// What is wrong with it
        reason: String,
    },

    /// The base request itself is unusable
    #[error("invalid base request: {0}")]
    InvalidBase(String),

    /// The protocol cannot run without a request source
    #[error("{0} load needs a request file (--from-json)")]
    Required(&'static str),
}

impl SourceError {
    pub(crate) fn entry(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            index,
            reason: reason.into(),
        }
    }
}

impl From<SourceError> for BenchError {
    fn from(err: SourceError) -> Self {
        BenchError::Source(err.to_string())
    }
}
