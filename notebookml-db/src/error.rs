//! Error types for the `notebookml-db` crate.

use thiserror::Error;

/// Errors that can occur in metadata handling and store operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// A metadata record failed its shape or enumeration constraints.
    #[error("Validation error at '{path}': {message}")]
    Validation {
        /// Dotted path of the offending field (`owner.type`, `source.url`, ...).
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// An operation targeted a collection that does not exist.
    #[error("Collection '{0}' does not exist")]
    CollectionNotFound(String),

    /// The vector engine rejected an operation.
    #[error("Backend error ({backend}): {message}")]
    Backend {
        /// The engine that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error from snapshot or config file handling.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON encoding or decoding error outside of metadata validation.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub(crate) fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { path: path.into(), message: message.into() }
    }

    pub(crate) fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend { backend: backend.into(), message: message.into() }
    }
}

/// A convenience result type for store operations.
pub type Result<T> = std::result::Result<T, DbError>;
