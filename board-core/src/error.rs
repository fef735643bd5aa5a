//! Error types for board operations.

use thiserror::Error;

/// Result type for board operations.
pub type BoardResult<T> = Result<T, BoardError>;

/// Errors that can occur in board operations.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Persisted bytes do not match the document schema.
    #[error("corrupt document: {0}")]
    CorruptDocument(#[from] serde_json::Error),

    /// Background image retrieval failed.
    #[error("background fetch failed: {0}")]
    Fetch(String),

    /// Bytes could not be decoded into an image.
    #[error("image decode failed: {0}")]
    Decode(String),
}
