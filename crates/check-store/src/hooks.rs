//! Collaborator seams consumed by the check store.

use async_trait::async_trait;

use check_core::SteamId;

/// Verdict from a downstream existence probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeVerdict {
    /// Whether the probe itself completed.
    pub success: bool,
    /// Whether the identifier already exists downstream.
    pub exists: bool,
    pub error: Option<String>,
}

/// Tests whether an identifier is already present in the downstream
/// database, so already-processed profiles are never re-inserted.
#[async_trait]
pub trait ExistenceProbe: Send + Sync {
    async fn check(&self, steam_id: &str) -> ProbeVerdict;
}

/// Receives completion acknowledgements when profiles are removed.
///
/// Implemented by the queue client; the store only ever calls it
/// best-effort. Returns false when the acknowledgement failed.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn complete_items(&self, steam_ids: &[SteamId]) -> bool;
}
