//! Error types for the check store.

use thiserror::Error;

/// Result type alias for check store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while persisting the check store document.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("write error: {0}")]
    Write(String),
}
