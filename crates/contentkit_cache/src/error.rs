//! Error types for cache operations.

use std::io;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored record could not be parsed.
    #[error("cache record {key} corrupted: {reason}")]
    Corrupted {
        /// Content key of the record.
        key: String,
        /// Parse failure.
        reason: String,
    },

    /// A string was not a valid content key.
    #[error("invalid content key: {0}")]
    InvalidKey(String),
}
