//! Coordinator — the single driver that owns all local state.
//!
//! One logical task performs every mutation of the check store and the
//! cooldown controller: it selects the next processable profile, runs
//! its outstanding checks, writes back status transitions, removes
//! completed profiles, and pulls fresh work from the remote queue when
//! idle and healthy.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use check_cooldown::{CooldownController, ErrorDisposition};
use check_core::{CheckName, CheckStatus};
use check_queue::WorkQueue;
use check_store::{AddOutcome, CheckStore, ExistenceProbe};

use crate::executor::{CheckExecutor, CheckOutcome};

/// Items requested per claim when refilling from empty.
const DEFAULT_CLAIM_BATCH: usize = 5;

/// Drives the check store, cooldown controller, and queue client.
pub struct Coordinator {
    store: CheckStore,
    cooldowns: CooldownController,
    executor: Arc<dyn CheckExecutor>,
    queue: Option<Arc<dyn WorkQueue>>,
    probe: Option<Arc<dyn ExistenceProbe>>,
    claim_batch: usize,
}

impl Coordinator {
    pub fn new(
        store: CheckStore,
        cooldowns: CooldownController,
        executor: Arc<dyn CheckExecutor>,
    ) -> Self {
        Self {
            store,
            cooldowns,
            executor,
            queue: None,
            probe: None,
            claim_batch: DEFAULT_CLAIM_BATCH,
        }
    }

    /// Wire the remote work queue used for claiming and releasing.
    pub fn with_queue(mut self, queue: Arc<dyn WorkQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Wire the downstream existence probe consulted on insert.
    pub fn with_probe(mut self, probe: Arc<dyn ExistenceProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_claim_batch(mut self, claim_batch: usize) -> Self {
        self.claim_batch = claim_batch;
        self
    }

    /// Run the driver loop until the shutdown signal fires.
    pub async fn run(
        mut self,
        poll_interval: Duration,
        sweep_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        self.release_orphaned_claims().await;
        let mut last_sweep = Instant::now();

        info!(
            profiles = self.store.len(),
            queue = self.queue.is_some(),
            "coordinator started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {
                    if last_sweep.elapsed() >= sweep_interval {
                        self.store.convert_deferred_to_to_check();
                        last_sweep = Instant::now();
                    }
                    self.cycle().await;
                }
                _ = shutdown.changed() => {
                    info!("coordinator shutting down");
                    break;
                }
            }
        }
    }

    /// Hand claims orphaned by a prior crash back to the shared queue.
    async fn release_orphaned_claims(&self) {
        if let Some(queue) = &self.queue {
            let released = queue.release_instance().await;
            debug!(released, "startup instance release");
        }
    }

    /// One scheduling step: process the next profile, or refill from
    /// the remote queue when there is nothing to process.
    async fn cycle(&mut self) {
        self.cooldowns.cleanup_expired();

        match self.store.next_processable().map(|p| p.steam_id.clone()) {
            Some(steam_id) => self.process_profile(&steam_id).await,
            None => self.refill().await,
        }
    }

    /// Drive every outstanding check of one profile, then remove it if
    /// that made it fully terminal.
    async fn process_profile(&mut self, steam_id: &str) {
        if self.store.completion(steam_id).all_complete {
            self.finish_profile(steam_id).await;
            return;
        }

        let outstanding: Vec<CheckName> = match self.store.profile(steam_id) {
            Some(profile) => profile
                .checks
                .iter()
                .filter(|&(_, status)| status == CheckStatus::ToCheck)
                .map(|(check, _)| check)
                .collect(),
            None => return,
        };

        for check in outstanding {
            let endpoint = check.endpoint();

            if !self.cooldowns.is_endpoint_available(endpoint) {
                debug!(%steam_id, %check, %endpoint, "endpoint cooling down, deferring check");
                self.store
                    .update_check(steam_id, check, CheckStatus::Deferred);
                continue;
            }

            match self.executor.execute(steam_id, check).await {
                CheckOutcome::Passed => {
                    self.store.update_check(steam_id, check, CheckStatus::Passed);
                    self.cooldowns.reset_on_success(endpoint);
                }
                CheckOutcome::Failed => {
                    self.store.update_check(steam_id, check, CheckStatus::Failed);
                    // The request itself succeeded, so the endpoint is
                    // demonstrably healthy.
                    self.cooldowns.reset_on_success(endpoint);
                }
                CheckOutcome::Upstream(upstream) => {
                    match self.cooldowns.handle_request_error(&upstream) {
                        ErrorDisposition::Cooldown { endpoint, reason } => {
                            debug!(%steam_id, %check, %endpoint, %reason, "check deferred by cooldown");
                            self.store
                                .update_check(steam_id, check, CheckStatus::Deferred);
                        }
                        ErrorDisposition::Passthrough { .. } => {
                            warn!(%steam_id, %check, error = %upstream, "check failed");
                            self.store.update_check(steam_id, check, CheckStatus::Failed);
                        }
                    }
                }
            }
        }

        if self.store.completion(steam_id).all_complete {
            self.finish_profile(steam_id).await;
        }
    }

    /// Remove a fully terminal profile; the store acknowledges the
    /// completion to the queue service.
    async fn finish_profile(&mut self, steam_id: &str) {
        let completion = self.store.completion(steam_id);
        info!(
            %steam_id,
            all_passed = completion.all_passed,
            "profile complete"
        );
        self.store.remove_profile(steam_id).await;
    }

    /// Claim fresh work, gated on local health. Items that cannot be
    /// inserted are released back to the shared queue one by one.
    async fn refill(&mut self) {
        let Some(queue) = self.queue.clone() else {
            return;
        };

        if !self.store.is_healthy(Some(&self.cooldowns)) {
            debug!("unhealthy, skipping claim this cycle");
            return;
        }

        let items = queue.claim_items(self.claim_batch).await;
        if items.is_empty() {
            return;
        }
        info!(claimed = items.len(), "claimed new work");

        for item in items {
            let outcome = self
                .store
                .add_profile(&item.id, item.username.as_deref(), self.probe.as_deref())
                .await;
            match outcome {
                Ok(AddOutcome::Inserted(_)) => {}
                Ok(AddOutcome::AlreadyPresent(_)) => {
                    debug!(steam_id = %item.id, "already tracked, releasing claim");
                    queue.release_items(&[item.id]).await;
                }
                Ok(AddOutcome::SuppressedByProbe) => {
                    queue.release_items(&[item.id]).await;
                }
                Err(e) => {
                    error!(steam_id = %item.id, error = %e, "insert failed, releasing claim");
                    queue.release_items(&[item.id]).await;
                }
            }
        }
    }

    pub fn store(&self) -> &CheckStore {
        &self.store
    }

    pub fn cooldowns(&self) -> &CooldownController {
        &self.cooldowns
    }
}
