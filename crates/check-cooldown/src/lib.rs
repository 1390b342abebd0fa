//! Per-endpoint cooldown control for the steamcheck worker.
//!
//! Tracks which upstream endpoints are currently usable, applies
//! exponential backoff to rate-limit signals and fixed cooldowns to
//! connectivity errors, and persists its state so backoff levels
//! survive restarts.

mod controller;
mod error;

pub use controller::{
    classify_connection_error, ConnectionStatus, CooldownController, EndpointState,
    ErrorDisposition, StatusSummary,
};
pub use error::{CooldownError, CooldownResult};
