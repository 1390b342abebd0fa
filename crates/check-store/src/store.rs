//! CheckStore — JSON-document-backed local check queue.
//!
//! Profiles are held in insertion order and mirrored to a single
//! pretty-printed JSON array document after every mutation, so the
//! on-disk state always reflects memory before a mutating call
//! returns. Reads tolerate an absent or malformed document by
//! starting empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use check_core::{epoch_ms, CheckName, CheckStatus, Profile, SteamId};
use check_cooldown::CooldownController;

use crate::error::{StoreError, StoreResult};
use crate::hooks::{CompletionSink, ExistenceProbe};

/// Result of an [`CheckStore::add_profile`] call.
#[derive(Debug, Clone)]
pub enum AddOutcome {
    /// A fresh profile was inserted.
    Inserted(Profile),
    /// The identifier was already tracked; the existing profile is
    /// returned unchanged.
    AlreadyPresent(Profile),
    /// The existence probe reported the identifier downstream already;
    /// nothing was inserted.
    SuppressedByProbe,
}

/// Aggregate counts by check status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub to_check: usize,
    pub passed: usize,
    pub failed: usize,
    pub deferred: usize,
}

/// Store-wide statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_profiles: usize,
    /// Username → number of profiles carrying it.
    pub by_username: HashMap<String, usize>,
    pub by_status: StatusCounts,
}

/// Statistics about deferred work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeferredStats {
    pub total_deferred: usize,
    pub profiles_with_deferred: usize,
    pub total_profiles: usize,
}

/// One deferred check, attributed to its profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeferredCheck {
    pub steam_id: SteamId,
    pub check: CheckName,
}

/// Completion state of a single profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Completion {
    /// Every check is `passed` or `failed`.
    pub all_complete: bool,
    /// Every check is `passed`.
    pub all_passed: bool,
}

/// Result of a deferred sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Number of checks rewritten from `deferred` to `to_check`.
    pub conversions: usize,
    /// Number of profiles that had at least one conversion.
    pub profiles_affected: usize,
}

/// The persistent local queue of profiles-with-checks.
pub struct CheckStore {
    path: Option<PathBuf>,
    /// Profiles in insertion order; at most one per steam id.
    profiles: Vec<Profile>,
    /// Completion acknowledgements on removal, when wired.
    queue: Option<Arc<dyn CompletionSink>>,
}

impl CheckStore {
    /// Open a persistent store at the given path.
    ///
    /// An absent or malformed document yields an empty store.
    pub fn open(path: &Path) -> Self {
        let profiles = load_profiles(path);
        debug!(?path, profiles = profiles.len(), "check store opened");
        Self {
            path: Some(path.to_path_buf()),
            profiles,
            queue: None,
        }
    }

    /// Create an ephemeral store with no backing document (for testing).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            profiles: Vec::new(),
            queue: None,
        }
    }

    /// Wire the completion sink invoked when profiles are removed.
    pub fn with_queue(mut self, queue: Arc<dyn CompletionSink>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Track a new identifier.
    ///
    /// If it is already tracked, the existing profile is returned
    /// unchanged. Otherwise the optional existence probe is consulted:
    /// a confirmed "exists" verdict suppresses the insert, while a
    /// failed probe inserts anyway with a warning. Fails only when the
    /// persisting write fails, so the caller can release the claim.
    pub async fn add_profile(
        &mut self,
        steam_id: &str,
        username: Option<&str>,
        probe: Option<&dyn ExistenceProbe>,
    ) -> StoreResult<AddOutcome> {
        if let Some(existing) = self.profiles.iter().find(|p| p.steam_id == steam_id) {
            debug!(%steam_id, "profile already tracked");
            return Ok(AddOutcome::AlreadyPresent(existing.clone()));
        }

        if let Some(probe) = probe {
            let verdict = probe.check(steam_id).await;
            if verdict.success {
                if verdict.exists {
                    info!(%steam_id, "already present downstream, suppressing insert");
                    return Ok(AddOutcome::SuppressedByProbe);
                }
            } else {
                warn!(
                    %steam_id,
                    error = verdict.error.as_deref().unwrap_or("unknown"),
                    "existence probe failed, inserting anyway"
                );
            }
        }

        let profile = Profile::new(steam_id, username, epoch_ms());
        self.profiles.push(profile.clone());
        self.persist()?;
        info!(%steam_id, username = %profile.username, "profile added");
        Ok(AddOutcome::Inserted(profile))
    }

    /// Write a new status for one check of one profile.
    ///
    /// Returns false when the profile is unknown or the write could
    /// not be persisted; neither fails the process.
    pub fn update_check(&mut self, steam_id: &str, check: CheckName, status: CheckStatus) -> bool {
        let Some(profile) = self.profiles.iter_mut().find(|p| p.steam_id == steam_id) else {
            warn!(%steam_id, %check, "cannot update check on unknown profile");
            return false;
        };

        profile.checks.set(check, status);
        debug!(%steam_id, %check, %status, "check updated");

        if let Err(e) = self.persist() {
            warn!(%steam_id, error = %e, "failed to persist check update");
            return false;
        }
        true
    }

    /// Remove a profile, acknowledging completion to the queue service
    /// when one is wired. The acknowledgement is best-effort; its
    /// failure does not fail the remove.
    pub async fn remove_profile(&mut self, steam_id: &str) -> bool {
        let Some(index) = self.profiles.iter().position(|p| p.steam_id == steam_id) else {
            warn!(%steam_id, "cannot remove unknown profile");
            return false;
        };

        self.profiles.remove(index);
        if let Err(e) = self.persist() {
            warn!(%steam_id, error = %e, "failed to persist profile removal");
            return false;
        }
        info!(%steam_id, remaining = self.profiles.len(), "profile removed");

        if let Some(queue) = &self.queue {
            if !queue.complete_items(&[steam_id.to_string()]).await {
                warn!(%steam_id, "completion acknowledgement failed, item may be redelivered");
            }
        }
        true
    }

    /// Select the next profile the coordinator should look at.
    ///
    /// First pass, in insertion order: any profile with outstanding
    /// work, or one where every check is terminal (so the coordinator
    /// performs its removal handling). Profiles holding only deferred
    /// and terminal checks are skipped. Second pass: the first profile
    /// with any deferred check.
    pub fn next_processable(&self) -> Option<&Profile> {
        for profile in &self.profiles {
            if profile.checks.any(CheckStatus::ToCheck) {
                return Some(profile);
            }
            if profile.checks.all_terminal() {
                return Some(profile);
            }
        }
        self.profiles
            .iter()
            .find(|p| p.checks.any(CheckStatus::Deferred))
    }

    pub fn profile(&self, steam_id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.steam_id == steam_id)
    }

    pub fn all(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Rewrite every deferred check back to outstanding, persisting
    /// once if anything changed. Run after endpoint cooldowns expire.
    pub fn convert_deferred_to_to_check(&mut self) -> SweepOutcome {
        let mut conversions = 0;
        let mut profiles_affected = 0;

        for profile in &mut self.profiles {
            let mut touched = false;
            for check in CheckName::ALL {
                if profile.checks.get(check) == CheckStatus::Deferred {
                    profile.checks.set(check, CheckStatus::ToCheck);
                    conversions += 1;
                    touched = true;
                }
            }
            if touched {
                profiles_affected += 1;
            }
        }

        if conversions > 0 {
            if let Err(e) = self.persist() {
                warn!(error = %e, "failed to persist deferred sweep");
            }
            info!(conversions, profiles_affected, "deferred checks requeued");
        }
        SweepOutcome {
            conversions,
            profiles_affected,
        }
    }

    pub fn stats(&self) -> StoreStats {
        stats_for(&self.profiles)
    }

    pub fn deferred_stats(&self) -> DeferredStats {
        deferred_stats_for(&self.profiles)
    }

    /// Every deferred check across the store, in insertion order.
    pub fn deferred_checks(&self) -> Vec<DeferredCheck> {
        let mut result = Vec::new();
        for profile in &self.profiles {
            for (check, status) in profile.checks.iter() {
                if status == CheckStatus::Deferred {
                    result.push(DeferredCheck {
                        steam_id: profile.steam_id.clone(),
                        check,
                    });
                }
            }
        }
        result
    }

    /// Completion state of a profile. Unknown profiles report a
    /// neutral not-complete shape.
    pub fn completion(&self, steam_id: &str) -> Completion {
        let Some(profile) = self.profile(steam_id) else {
            warn!(%steam_id, "completion queried for unknown profile");
            return Completion {
                all_complete: false,
                all_passed: false,
            };
        };
        Completion {
            all_complete: profile.checks.all_terminal(),
            all_passed: profile
                .checks
                .iter()
                .all(|(_, s)| s == CheckStatus::Passed),
        }
    }

    /// Gate for claiming new work: no profile may hold a deferred
    /// check, and (when a cooldown controller is wired) at least one
    /// endpoint must be usable.
    pub fn is_healthy(&self, cooldowns: Option<&CooldownController>) -> bool {
        let has_deferred = self
            .profiles
            .iter()
            .any(|p| p.checks.any(CheckStatus::Deferred));
        if has_deferred {
            return false;
        }
        match cooldowns {
            Some(controller) => controller.any_endpoint_available(),
            None => true,
        }
    }

    /// Mirror the in-memory state to the backing document.
    fn persist(&self) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.profiles)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }
}

/// Store-wide statistics over any profile list. Shared with read-only
/// consumers of the document.
pub fn stats_for(profiles: &[Profile]) -> StoreStats {
    let mut by_username: HashMap<String, usize> = HashMap::new();
    let mut by_status = StatusCounts::default();

    for profile in profiles {
        *by_username.entry(profile.username.clone()).or_default() += 1;
        for (_, status) in profile.checks.iter() {
            match status {
                CheckStatus::ToCheck => by_status.to_check += 1,
                CheckStatus::Passed => by_status.passed += 1,
                CheckStatus::Failed => by_status.failed += 1,
                CheckStatus::Deferred => by_status.deferred += 1,
            }
        }
    }

    StoreStats {
        total_profiles: profiles.len(),
        by_username,
        by_status,
    }
}

/// Deferred-work statistics over any profile list.
pub fn deferred_stats_for(profiles: &[Profile]) -> DeferredStats {
    let mut total_deferred = 0;
    let mut profiles_with_deferred = 0;
    for profile in profiles {
        let deferred = profile.checks.count(CheckStatus::Deferred);
        total_deferred += deferred;
        if deferred > 0 {
            profiles_with_deferred += 1;
        }
    }
    DeferredStats {
        total_deferred,
        profiles_with_deferred,
        total_profiles: profiles.len(),
    }
}

/// Read a profile document, treating an absent or malformed file as empty.
///
/// Also used by read-only consumers (status API, offline inspection)
/// that must never write the document.
pub fn load_profiles(path: &Path) -> Vec<Profile> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(?path, error = %e, "failed to read check store document, starting empty");
            return Vec::new();
        }
    };
    match serde_json::from_str(&content) {
        Ok(profiles) => profiles,
        Err(e) => {
            warn!(?path, error = %e, "malformed check store document, starting empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::hooks::ProbeVerdict;
    use check_core::{CooldownDurations, CooldownReason, EndpointName, DEFAULT_USERNAME};

    struct StaticProbe {
        verdict: ProbeVerdict,
    }

    #[async_trait]
    impl ExistenceProbe for StaticProbe {
        async fn check(&self, _steam_id: &str) -> ProbeVerdict {
            self.verdict.clone()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        completed: Mutex<Vec<SteamId>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionSink for RecordingSink {
        async fn complete_items(&self, steam_ids: &[SteamId]) -> bool {
            self.completed.lock().unwrap().extend_from_slice(steam_ids);
            !self.fail
        }
    }

    async fn add(store: &mut CheckStore, id: &str, username: Option<&str>) -> AddOutcome {
        store.add_profile(id, username, None).await.unwrap()
    }

    fn set_all(store: &mut CheckStore, id: &str, status: CheckStatus) {
        for check in CheckName::ALL {
            assert!(store.update_check(id, check, status));
        }
    }

    // ── add_profile ────────────────────────────────────────────────

    #[tokio::test]
    async fn add_creates_profile_with_all_checks_outstanding() {
        let mut store = CheckStore::in_memory();
        let outcome = add(&mut store, "A", Some("alice")).await;

        let AddOutcome::Inserted(profile) = outcome else {
            panic!("expected insert");
        };
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.checks.count(CheckStatus::ToCheck), 7);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn add_twice_keeps_single_entry_and_returns_existing() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", Some("alice")).await;
        store.update_check("A", CheckName::Friends, CheckStatus::Passed);

        let outcome = add(&mut store, "A", Some("other")).await;
        let AddOutcome::AlreadyPresent(existing) = outcome else {
            panic!("expected existing profile");
        };
        assert_eq!(existing.username, "alice");
        assert_eq!(existing.checks.get(CheckName::Friends), CheckStatus::Passed);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn add_blank_username_stored_as_default() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", Some("")).await;
        add(&mut store, "B", None).await;

        assert_eq!(store.profile("A").unwrap().username, DEFAULT_USERNAME);
        assert_eq!(store.profile("B").unwrap().username, DEFAULT_USERNAME);
    }

    #[tokio::test]
    async fn add_suppressed_when_probe_confirms_existence() {
        let mut store = CheckStore::in_memory();
        let probe = StaticProbe {
            verdict: ProbeVerdict {
                success: true,
                exists: true,
                error: None,
            },
        };

        let outcome = store.add_profile("B", Some(""), Some(&probe)).await.unwrap();
        assert!(matches!(outcome, AddOutcome::SuppressedByProbe));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn add_inserts_when_probe_confirms_absence() {
        let mut store = CheckStore::in_memory();
        let probe = StaticProbe {
            verdict: ProbeVerdict {
                success: true,
                exists: false,
                error: None,
            },
        };

        let outcome = store.add_profile("B", None, Some(&probe)).await.unwrap();
        assert!(matches!(outcome, AddOutcome::Inserted(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn add_inserts_anyway_when_probe_fails() {
        let mut store = CheckStore::in_memory();
        let probe = StaticProbe {
            verdict: ProbeVerdict {
                success: false,
                exists: false,
                error: Some("api unreachable".to_string()),
            },
        };

        let outcome = store.add_profile("B", None, Some(&probe)).await.unwrap();
        assert!(matches!(outcome, AddOutcome::Inserted(_)));
        assert_eq!(store.len(), 1);
    }

    // ── update_check ───────────────────────────────────────────────

    #[tokio::test]
    async fn update_check_transitions_status() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", None).await;

        assert!(store.update_check("A", CheckName::Friends, CheckStatus::Deferred));
        assert_eq!(
            store.profile("A").unwrap().checks.get(CheckName::Friends),
            CheckStatus::Deferred
        );
    }

    #[test]
    fn update_check_unknown_profile_returns_false() {
        let mut store = CheckStore::in_memory();
        assert!(!store.update_check("nope", CheckName::Friends, CheckStatus::Passed));
    }

    // ── remove_profile ─────────────────────────────────────────────

    #[tokio::test]
    async fn remove_deletes_and_acknowledges_completion() {
        let sink = Arc::new(RecordingSink::default());
        let mut store = CheckStore::in_memory().with_queue(sink.clone());
        add(&mut store, "A", None).await;

        assert!(store.remove_profile("A").await);
        assert!(store.profile("A").is_none());
        assert_eq!(*sink.completed.lock().unwrap(), vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn remove_succeeds_when_acknowledgement_fails() {
        let sink = Arc::new(RecordingSink {
            completed: Mutex::new(Vec::new()),
            fail: true,
        });
        let mut store = CheckStore::in_memory().with_queue(sink.clone());
        add(&mut store, "A", None).await;

        assert!(store.remove_profile("A").await);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn remove_unknown_profile_returns_false() {
        let mut store = CheckStore::in_memory();
        assert!(!store.remove_profile("nope").await);
    }

    // ── next_processable ───────────────────────────────────────────

    #[test]
    fn next_processable_empty_store_returns_none() {
        let store = CheckStore::in_memory();
        assert!(store.next_processable().is_none());
    }

    #[tokio::test]
    async fn next_processable_prefers_outstanding_in_insertion_order() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", None).await;
        add(&mut store, "B", None).await;

        assert_eq!(store.next_processable().unwrap().steam_id, "A");
    }

    #[tokio::test]
    async fn next_processable_returns_fully_terminal_profile() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", None).await;
        set_all(&mut store, "A", CheckStatus::Passed);

        // The coordinator must see it to perform removal.
        assert_eq!(store.next_processable().unwrap().steam_id, "A");
    }

    #[tokio::test]
    async fn next_processable_skips_deferred_only_profiles_in_first_pass() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", None).await;
        set_all(&mut store, "A", CheckStatus::Deferred);
        add(&mut store, "B", None).await;

        // B has outstanding work; A holds only deferred checks.
        assert_eq!(store.next_processable().unwrap().steam_id, "B");
    }

    #[tokio::test]
    async fn next_processable_falls_back_to_deferred() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", None).await;
        set_all(&mut store, "A", CheckStatus::Passed);
        store.update_check("A", CheckName::Friends, CheckStatus::Deferred);

        // Only deferred + terminal checks anywhere: second pass returns it.
        assert_eq!(store.next_processable().unwrap().steam_id, "A");
    }

    #[tokio::test]
    async fn next_processable_mixed_deferred_and_outstanding_counts_as_outstanding() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", None).await;
        store.update_check("A", CheckName::Friends, CheckStatus::Deferred);

        assert_eq!(store.next_processable().unwrap().steam_id, "A");
    }

    // ── deferred sweep ─────────────────────────────────────────────

    #[tokio::test]
    async fn sweep_rewrites_deferred_and_reports_counts() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", None).await;
        set_all(&mut store, "A", CheckStatus::Passed);
        store.update_check("A", CheckName::Friends, CheckStatus::Deferred);
        add(&mut store, "B", None).await;
        store.update_check("B", CheckName::SteamLevel, CheckStatus::Deferred);
        store.update_check("B", CheckName::CsgoInventory, CheckStatus::Deferred);

        let outcome = store.convert_deferred_to_to_check();
        assert_eq!(
            outcome,
            SweepOutcome {
                conversions: 3,
                profiles_affected: 2,
            }
        );
        assert_eq!(store.deferred_stats().total_deferred, 0);
        assert_eq!(
            store.profile("A").unwrap().checks.get(CheckName::Friends),
            CheckStatus::ToCheck
        );
    }

    #[tokio::test]
    async fn sweep_without_deferred_is_noop() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", None).await;

        let outcome = store.convert_deferred_to_to_check();
        assert_eq!(outcome.conversions, 0);
        assert_eq!(outcome.profiles_affected, 0);
    }

    // ── stats & completion ─────────────────────────────────────────

    #[tokio::test]
    async fn stats_count_by_username_and_status() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", Some("alice")).await;
        add(&mut store, "B", Some("alice")).await;
        add(&mut store, "C", None).await;
        store.update_check("A", CheckName::Friends, CheckStatus::Passed);
        store.update_check("B", CheckName::Friends, CheckStatus::Failed);
        store.update_check("C", CheckName::Friends, CheckStatus::Deferred);

        let stats = store.stats();
        assert_eq!(stats.total_profiles, 3);
        assert_eq!(stats.by_username["alice"], 2);
        assert_eq!(stats.by_username[DEFAULT_USERNAME], 1);
        assert_eq!(
            stats.by_status,
            StatusCounts {
                to_check: 18,
                passed: 1,
                failed: 1,
                deferred: 1,
            }
        );
    }

    #[tokio::test]
    async fn deferred_stats_and_listing() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", None).await;
        add(&mut store, "B", None).await;
        store.update_check("A", CheckName::Friends, CheckStatus::Deferred);
        store.update_check("A", CheckName::SteamLevel, CheckStatus::Deferred);

        assert_eq!(
            store.deferred_stats(),
            DeferredStats {
                total_deferred: 2,
                profiles_with_deferred: 1,
                total_profiles: 2,
            }
        );
        let listing = store.deferred_checks();
        assert_eq!(listing.len(), 2);
        assert!(listing.iter().all(|d| d.steam_id == "A"));
        assert!(listing.iter().any(|d| d.check == CheckName::Friends));
    }

    #[tokio::test]
    async fn completion_reflects_terminal_states() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", None).await;
        assert_eq!(
            store.completion("A"),
            Completion {
                all_complete: false,
                all_passed: false,
            }
        );

        set_all(&mut store, "A", CheckStatus::Passed);
        assert_eq!(
            store.completion("A"),
            Completion {
                all_complete: true,
                all_passed: true,
            }
        );

        store.update_check("A", CheckName::Friends, CheckStatus::Failed);
        assert_eq!(
            store.completion("A"),
            Completion {
                all_complete: true,
                all_passed: false,
            }
        );
    }

    #[test]
    fn completion_unknown_profile_is_neutral() {
        let store = CheckStore::in_memory();
        assert_eq!(
            store.completion("nope"),
            Completion {
                all_complete: false,
                all_passed: false,
            }
        );
    }

    // ── health gate ────────────────────────────────────────────────

    #[tokio::test]
    async fn healthy_when_empty_and_no_controller() {
        let store = CheckStore::in_memory();
        assert!(store.is_healthy(None));
    }

    #[tokio::test]
    async fn unhealthy_when_any_check_deferred() {
        let mut store = CheckStore::in_memory();
        add(&mut store, "A", None).await;
        store.update_check("A", CheckName::Friends, CheckStatus::Deferred);

        assert!(!store.is_healthy(None));
    }

    #[tokio::test]
    async fn unhealthy_when_every_endpoint_cooled() {
        let store = CheckStore::in_memory();
        let mut controller =
            CooldownController::in_memory(CooldownDurations::default(), vec![60]);
        assert!(store.is_healthy(Some(&controller)));

        for endpoint in EndpointName::ALL {
            controller.mark_cooldown(endpoint, CooldownReason::Timeout, "timeout");
        }
        assert!(!store.is_healthy(Some(&controller)));
    }

    // ── persistence ────────────────────────────────────────────────

    #[tokio::test]
    async fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checks.json");

        {
            let mut store = CheckStore::open(&path);
            add(&mut store, "A", Some("alice")).await;
            store.update_check("A", CheckName::Friends, CheckStatus::Passed);
        }

        let store = CheckStore::open(&path);
        let profile = store.profile("A").unwrap();
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.checks.get(CheckName::Friends), CheckStatus::Passed);
    }

    #[tokio::test]
    async fn document_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checks.json");

        {
            let mut store = CheckStore::open(&path);
            for id in ["C", "A", "B"] {
                add(&mut store, id, None).await;
            }
        }

        let store = CheckStore::open(&path);
        let order: Vec<&str> = store.all().iter().map(|p| p.steam_id.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn deleted_document_is_recreated_by_next_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checks.json");

        let mut store = CheckStore::open(&path);
        add(&mut store, "A", None).await;
        std::fs::remove_file(&path).unwrap();

        // A fresh read sees an empty document.
        assert!(load_profiles(&path).is_empty());

        // The next mutation rewrites the document in full.
        add(&mut store, "B", None).await;
        assert!(path.exists());
        assert_eq!(load_profiles(&path).len(), 2);
    }

    #[test]
    fn malformed_document_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checks.json");
        std::fs::write(&path, "[{broken").unwrap();

        let store = CheckStore::open(&path);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn document_is_pretty_printed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checks.json");

        let mut store = CheckStore::open(&path);
        add(&mut store, "A", None).await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("[\n  {"));
        assert!(content.contains("\n    \"steam_id\": \"A\""));
    }
}
