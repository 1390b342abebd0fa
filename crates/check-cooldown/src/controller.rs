//! Cooldown controller — records and answers "is endpoint E usable now?".
//!
//! Two pieces of state with different lifetimes:
//!
//! - **Active cooldown records**, one per endpoint, cleared when their
//!   deadline passes (or, for 429 records, on an observed success).
//! - **The backoff-level table**, which survives record expiry so that a
//!   fresh 429 escalates from the previous level instead of restarting
//!   at zero. Only an observed success clears a level.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use check_core::{
    epoch_ms, CooldownDurations, CooldownReason, EndpointCooldown, EndpointName, UpstreamError,
    DEFAULT_BACKOFF_SEQUENCE,
};

use crate::error::{CooldownError, CooldownResult};

/// On-disk document: a single top-level key mapping endpoint → record.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CooldownDocument {
    endpoint_cooldowns: HashMap<EndpointName, EndpointCooldown>,
}

/// What the controller decided about a failed upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// A cooldown was applied; the caller should defer the check.
    Cooldown {
        endpoint: EndpointName,
        reason: CooldownReason,
    },
    /// Not cooldown-worthy; the caller decides what to do with it.
    Passthrough { endpoint: EndpointName },
}

/// Per-endpoint availability as reported by [`CooldownController::connection_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EndpointState {
    Available,
    Cooldown {
        remaining_ms: u64,
        reason: CooldownReason,
        until: u64,
    },
}

/// Aggregate availability across all endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub available_connections: usize,
    pub total_connections: usize,
    /// Milliseconds until the soonest cooled endpoint frees up, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_available_in: Option<u64>,
}

/// Full availability report for the health gate and the status API.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub connections: HashMap<EndpointName, EndpointState>,
    pub summary: StatusSummary,
}

/// Tracks cooldowns and backoff levels for every upstream endpoint.
pub struct CooldownController {
    path: Option<PathBuf>,
    cooldowns: HashMap<EndpointName, EndpointCooldown>,
    /// Last-known 429 backoff level per endpoint. Deliberately NOT
    /// cleared when a cooldown record expires.
    backoff_levels: HashMap<EndpointName, usize>,
    durations: CooldownDurations,
    /// 429 cooldown durations in minutes, indexed by backoff level.
    backoff_sequence: Vec<u64>,
}

impl CooldownController {
    /// Open a persistent controller, rehydrating cooldown records and
    /// 429 backoff levels from the given document.
    ///
    /// An absent or malformed document yields an empty controller. An
    /// empty backoff sequence is replaced with the built-in default.
    pub fn open(
        path: &Path,
        durations: CooldownDurations,
        backoff_sequence: Vec<u64>,
    ) -> Self {
        let cooldowns = load_document(path).endpoint_cooldowns;
        let mut controller = Self {
            path: Some(path.to_path_buf()),
            cooldowns,
            backoff_levels: HashMap::new(),
            durations,
            backoff_sequence: validate_sequence(backoff_sequence),
        };
        controller.rehydrate_backoff_levels();
        controller
    }

    /// Create an ephemeral controller with no backing document (for testing).
    pub fn in_memory(durations: CooldownDurations, backoff_sequence: Vec<u64>) -> Self {
        Self {
            path: None,
            cooldowns: HashMap::new(),
            backoff_levels: HashMap::new(),
            durations,
            backoff_sequence: validate_sequence(backoff_sequence),
        }
    }

    /// Copy the backoff level of every persisted 429 record into the
    /// backoff-level table so escalation continues across restarts.
    fn rehydrate_backoff_levels(&mut self) {
        for (&endpoint, record) in &self.cooldowns {
            if record.reason == CooldownReason::RateLimited {
                if let Some(level) = record.backoff_level {
                    let level = level.min(self.backoff_sequence.len() - 1);
                    self.backoff_levels.insert(endpoint, level);
                    debug!(%endpoint, level, "rehydrated backoff level");
                }
            }
        }
    }

    /// True when the endpoint has no active cooldown or its deadline
    /// has passed.
    pub fn is_endpoint_available(&self, endpoint: EndpointName) -> bool {
        match self.cooldowns.get(&endpoint) {
            Some(record) => record.cooldown_until <= epoch_ms(),
            None => true,
        }
    }

    /// True when at least one endpoint is currently usable.
    pub fn any_endpoint_available(&self) -> bool {
        EndpointName::ALL
            .iter()
            .any(|&e| self.is_endpoint_available(e))
    }

    /// Apply a cooldown to an endpoint.
    ///
    /// 429s escalate through the backoff sequence, capped at the last
    /// index; connectivity errors use the fixed configured duration.
    pub fn mark_cooldown(
        &mut self,
        endpoint: EndpointName,
        reason: CooldownReason,
        error_message: &str,
    ) {
        let now = epoch_ms();
        let record = match reason {
            CooldownReason::RateLimited => {
                let level = match self.backoff_levels.get(&endpoint) {
                    Some(&current) => (current + 1).min(self.backoff_sequence.len() - 1),
                    None => 0,
                };
                let minutes = self.backoff_sequence[level];
                self.backoff_levels.insert(endpoint, level);
                warn!(
                    %endpoint,
                    level,
                    minutes,
                    "rate limited, applying escalated cooldown"
                );
                EndpointCooldown {
                    cooldown_until: now + minutes * 60_000,
                    reason,
                    backoff_level: Some(level),
                    duration_minutes: Some(minutes),
                    duration_used: None,
                    applied_at: now,
                    error_message: error_message.to_string(),
                }
            }
            _ => {
                let duration_ms = match reason {
                    CooldownReason::ConnectionError => self.durations.connection_reset_ms,
                    CooldownReason::Timeout => self.durations.timeout_ms,
                    CooldownReason::DnsFailure => self.durations.dns_failure_ms,
                    CooldownReason::RateLimited => unreachable!(),
                };
                warn!(%endpoint, %reason, duration_ms, "applying fixed cooldown");
                EndpointCooldown {
                    cooldown_until: now + duration_ms,
                    reason,
                    backoff_level: None,
                    duration_minutes: None,
                    duration_used: Some(duration_ms),
                    applied_at: now,
                    error_message: error_message.to_string(),
                }
            }
        };

        self.cooldowns.insert(endpoint, record);
        self.persist_logged();
    }

    /// Record an observed success against an endpoint.
    ///
    /// Clears the backoff level and any active 429 record. Fixed
    /// connectivity cooldowns are left in place; they only clear by
    /// deadline expiry.
    pub fn reset_on_success(&mut self, endpoint: EndpointName) {
        let had_level = self.backoff_levels.remove(&endpoint).is_some();

        let is_rate_limited = matches!(
            self.cooldowns.get(&endpoint),
            Some(record) if record.reason == CooldownReason::RateLimited
        );
        let cleared_record = if is_rate_limited {
            self.cooldowns.remove(&endpoint);
            true
        } else {
            false
        };

        if cleared_record {
            self.persist_logged();
        }
        if had_level || cleared_record {
            info!(%endpoint, "endpoint recovered, backoff reset");
        }
    }

    /// Classify a failed upstream request and apply a cooldown when it
    /// is cooldown-worthy.
    pub fn handle_request_error(&mut self, error: &UpstreamError) -> ErrorDisposition {
        let endpoint = EndpointName::from_url(&error.url);

        if error.status == Some(429) {
            self.mark_cooldown(endpoint, CooldownReason::RateLimited, &error.message);
            return ErrorDisposition::Cooldown {
                endpoint,
                reason: CooldownReason::RateLimited,
            };
        }

        match classify_connection_error(&error.message) {
            Some(reason) => {
                self.mark_cooldown(endpoint, reason, &error.message);
                ErrorDisposition::Cooldown { endpoint, reason }
            }
            None => ErrorDisposition::Passthrough { endpoint },
        }
    }

    /// Delete every cooldown record whose deadline has passed.
    ///
    /// Backoff levels are NOT cleared here: a 429 arriving after its
    /// cooldown expired must escalate from the previous level.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = epoch_ms();
        let before = self.cooldowns.len();
        self.cooldowns.retain(|endpoint, record| {
            let keep = record.cooldown_until > now;
            if !keep {
                debug!(%endpoint, reason = %record.reason, "cooldown expired");
            }
            keep
        });
        let removed = before - self.cooldowns.len();
        if removed > 0 {
            self.persist_logged();
        }
        removed
    }

    /// Report per-endpoint availability after sweeping expired records.
    pub fn connection_status(&mut self) -> ConnectionStatus {
        self.cleanup_expired();
        let now = epoch_ms();

        let mut connections = HashMap::new();
        let mut available = 0;
        let mut next_available_in: Option<u64> = None;

        for &endpoint in &EndpointName::ALL {
            let state = match self.cooldowns.get(&endpoint) {
                Some(record) if record.cooldown_until > now => {
                    let remaining = record.cooldown_until - now;
                    next_available_in = Some(match next_available_in {
                        Some(current) => current.min(remaining),
                        None => remaining,
                    });
                    EndpointState::Cooldown {
                        remaining_ms: remaining,
                        reason: record.reason,
                        until: record.cooldown_until,
                    }
                }
                _ => {
                    available += 1;
                    EndpointState::Available
                }
            };
            connections.insert(endpoint, state);
        }

        ConnectionStatus {
            connections,
            summary: StatusSummary {
                available_connections: available,
                total_connections: EndpointName::ALL.len(),
                next_available_in,
            },
        }
    }

    /// Last-known 429 backoff level for an endpoint.
    pub fn backoff_level(&self, endpoint: EndpointName) -> Option<usize> {
        self.backoff_levels.get(&endpoint).copied()
    }

    /// The active cooldown record for an endpoint, if any.
    pub fn cooldown(&self, endpoint: EndpointName) -> Option<&EndpointCooldown> {
        self.cooldowns.get(&endpoint)
    }

    fn persist(&self) -> CooldownResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let document = CooldownDocument {
            endpoint_cooldowns: self.cooldowns.clone(),
        };
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| CooldownError::Serialize(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CooldownError::Write(e.to_string()))?;
        Ok(())
    }

    /// Persist, logging failures. The in-memory state stays authoritative.
    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            warn!(error = %e, "failed to persist cooldown state, continuing in memory");
        }
    }
}

/// Substring classification of connectivity errors, first match wins.
///
/// Anything that matches none of the probes is not cooldown-worthy.
pub fn classify_connection_error(message: &str) -> Option<CooldownReason> {
    const DNS: [&str; 2] = ["ENOTFOUND", "EHOSTUNREACH"];
    const TIMEOUT: [&str; 2] = ["timeout", "ETIMEDOUT"];
    const CONNECTION: [&str; 7] = [
        "socket disconnected",
        "socket hang up",
        "ECONNRESET",
        "ECONNREFUSED",
        "certificate",
        "SSL",
        "TLS",
    ];

    if DNS.iter().any(|needle| message.contains(needle)) {
        return Some(CooldownReason::DnsFailure);
    }
    if TIMEOUT.iter().any(|needle| message.contains(needle)) {
        return Some(CooldownReason::Timeout);
    }
    if CONNECTION.iter().any(|needle| message.contains(needle)) {
        return Some(CooldownReason::ConnectionError);
    }
    None
}

/// Read the cooldown document, treating an absent or malformed file as empty.
fn load_document(path: &Path) -> CooldownDocument {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CooldownDocument::default(),
        Err(e) => {
            warn!(?path, error = %e, "failed to read cooldown document, starting empty");
            return CooldownDocument::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(document) => document,
        Err(e) => {
            warn!(?path, error = %e, "malformed cooldown document, starting empty");
            CooldownDocument::default()
        }
    }
}

fn validate_sequence(sequence: Vec<u64>) -> Vec<u64> {
    if sequence.is_empty() {
        warn!("invalid backoff sequence, substituting default");
        DEFAULT_BACKOFF_SEQUENCE.to_vec()
    } else {
        sequence
    }
}
