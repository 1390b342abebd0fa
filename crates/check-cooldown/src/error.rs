//! Error types for the cooldown controller.

use thiserror::Error;

/// Result type alias for cooldown persistence operations.
pub type CooldownResult<T> = Result<T, CooldownError>;

/// Errors that can occur while persisting cooldown state.
///
/// Cooldown mutations never fail outward: a failed write is logged and
/// the controller keeps operating on its in-memory state.
#[derive(Debug, Error)]
pub enum CooldownError {
    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("write error: {0}")]
    Write(String),
}
