//! Error types for benchvault.

use thiserror::Error;

/// Result type for benchvault operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for benchvault operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Malformed input record (missing required field, unknown environment).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A transaction with the same idempotency key but different content
    /// was already recorded.
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// Storage unavailable or a storage operation failed. Transient;
    /// the whole upsert call is safe to retry with the same run id.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Requested snapshot version or record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input provided to an evaluation or query API.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Regression detection failed. Never surfaced from the write path;
    /// logged and treated as "no alert".
    #[error("Regression detection error: {0}")]
    Regression(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a duplicate transaction error.
    pub fn duplicate(msg: impl Into<String>) -> Self {
        Error::DuplicateTransaction(msg.into())
    }

    /// Create a persistence error.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Error::Persistence(msg.into())
    }

    /// Create a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a regression detection error.
    pub fn regression(msg: impl Into<String>) -> Self {
        Error::Regression(msg.into())
    }
}
