//! Read-only status API.
//!
//! Serves worker health and progress from the persisted state
//! documents. Handlers never write: the coordinator stays the only
//! writer of both files.

use std::path::PathBuf;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use check_store::{deferred_stats_for, load_profiles, stats_for};

/// Paths to the two persisted documents the handlers read.
#[derive(Debug, Clone)]
pub struct StatusState {
    pub state_file: PathBuf,
    pub cooldown_file: PathBuf,
}

pub fn build_router(state: StatusState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/status", get(status))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// GET /api/v1/status
async fn status(State(state): State<StatusState>) -> Json<Value> {
    Json(status_payload(&state))
}

/// Build the status document. Shared with the offline `inspect`
/// subcommand.
pub fn status_payload(state: &StatusState) -> Value {
    let profiles = load_profiles(&state.state_file);
    let cooldowns = load_cooldown_document(&state.cooldown_file);

    json!({
        "profiles": stats_for(&profiles),
        "deferred": deferred_stats_for(&profiles),
        "endpoint_cooldowns": cooldowns["endpoint_cooldowns"],
    })
}

fn load_cooldown_document(path: &std::path::Path) -> Value {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_else(|| json!({ "endpoint_cooldowns": {} }))
}
