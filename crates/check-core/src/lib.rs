//! Shared domain types and configuration for the steamcheck worker.
//!
//! Everything that more than one crate needs lives here: the closed
//! check/endpoint/status enumerations, the persisted `Profile` and
//! `EndpointCooldown` shapes, the queue wire types, and the TOML
//! configuration loader.

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;

/// Current Unix epoch in milliseconds.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
