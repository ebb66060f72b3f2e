//! Pipeline error taxonomy.
//!
//! Every variant is `Clone`: one failed computation is reported to every
//! caller that was waiting on the same key.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Errors scoped to a single request or asset key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// Sniffed or requested type is not one of the supported formats.
    #[error("unsupported image format `{format}` for `{source_ref}`")]
    UnsupportedFormat { source_ref: String, format: String },

    /// Request parameters are inconsistent (e.g. inline with several widths).
    #[error("invalid transform config: {0}")]
    InvalidConfig(String),

    /// The image backend failed to resize or encode.
    #[error("transform failed for `{key}`: {reason}")]
    TransformFailed { key: String, reason: String },

    /// The source could not be fetched or read.
    #[error("source unavailable `{source_ref}`: {reason}")]
    SourceUnavailable { source_ref: String, reason: String },

    /// Filesystem failure outside of source loading (flush, cache writes).
    #[error("IO error at `{}`: {reason}", path.display())]
    Io { path: PathBuf, reason: String },
}

impl PipelineError {
    pub fn unsupported(source_ref: impl Into<String>, format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            source_ref: source_ref.into(),
            format: format.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn transform(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::TransformFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unavailable(source_ref: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_ref: source_ref.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}
