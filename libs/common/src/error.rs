//! Custom error types for the common library
//!
//! This module defines the errors raised while reading or writing the
//! persisted client session.

use thiserror::Error;

/// Custom error type for session storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error occurred while reading or writing the backing file
    #[error("Session storage I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// Error occurred while encoding or decoding stored data
    #[error("Session storage serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}

/// Type alias for Result with StorageError
pub type StorageResult<T> = Result<T, StorageError>;
