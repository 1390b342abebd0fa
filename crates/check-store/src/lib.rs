//! Persistent local check queue for the steamcheck worker.
//!
//! The `CheckStore` is the single source of truth for in-flight work on
//! this host: every claimed profile, the status of each of its checks,
//! and the selection logic that decides what the coordinator processes
//! next.

mod error;
mod hooks;
mod store;

pub use error::{StoreError, StoreResult};
pub use hooks::{CompletionSink, ExistenceProbe, ProbeVerdict};
pub use store::{
    deferred_stats_for, load_profiles, stats_for, AddOutcome, CheckStore, Completion,
    DeferredCheck, DeferredStats, StatusCounts, StoreStats, SweepOutcome,
};
