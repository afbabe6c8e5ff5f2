use std::path::PathBuf;

use crate::ffmetadata::error::FfMetadataError;
use crate::foundation::mime::MimeTypeError;

/// Convenience result type used across madam.
pub type MadamResult<T> = Result<T, MadamError>;

/// Top-level error taxonomy used by codec, pipeline and storage APIs.
#[derive(thiserror::Error, Debug)]
pub enum MadamError {
    /// No codec recognizes the content, or the essence is malformed for the selected codec.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Transform preconditions were violated or the external transform failed.
    #[error("operator error: {0}")]
    Operator(String),

    /// Malformed FFmetadata text.
    #[error(transparent)]
    Parse(#[from] FfMetadataError),

    /// Invalid MIME type string.
    #[error(transparent)]
    Mime(#[from] MimeTypeError),

    /// The requested asset or key does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A filesystem path exists but cannot be used.
    #[error("path already exists and is not a storage directory: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Invalid configuration values.
    #[error("configuration error: {0}")]
    Config(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MadamError {
    /// Build a [`MadamError::UnsupportedFormat`] value.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Build a [`MadamError::Operator`] value.
    pub fn operator(msg: impl Into<String>) -> Self {
        Self::Operator(msg.into())
    }

    /// Build a [`MadamError::NotFound`] value.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Build a [`MadamError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`MadamError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
