//! checkd.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Escalating 429 cooldown durations, in minutes, substituted when the
/// configured sequence is missing or empty.
pub const DEFAULT_BACKOFF_SEQUENCE: [u64; 10] = [1, 2, 4, 8, 16, 32, 60, 120, 240, 480];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CheckdConfig {
    /// Remote work queue. Without this section the worker only drains
    /// locally enqueued profiles.
    pub queue: Option<QueueConfig>,
    pub upstream: UpstreamConfig,
    /// Downstream existence probe. Without this section inserts are
    /// never suppressed.
    pub probe: Option<ProbeConfig>,
    pub cooldowns: CooldownDurations,
    /// 429 backoff sequence in minutes.
    pub backoff_sequence: Vec<u64>,
    pub storage: StorageConfig,
    pub daemon: DaemonConfig,
}

/// Connection settings for the remote work queue service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub base_url: String,
    pub api_key: String,
    /// Stable per-process identity used to attribute claims.
    pub instance_id: String,
    /// Items requested per claim when refilling from empty.
    #[serde(default = "default_claim_batch")]
    pub claim_batch: usize,
}

/// Base URLs and credentials for the upstream service the checks run
/// against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub api_base_url: String,
    pub community_base_url: String,
    pub api_key: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.steampowered.com".to_string(),
            community_base_url: "https://steamcommunity.com".to_string(),
            api_key: String::new(),
        }
    }
}

/// Connection settings for the downstream existence probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

/// Fixed cooldown durations for connectivity errors, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownDurations {
    pub connection_reset_ms: u64,
    pub timeout_ms: u64,
    pub dns_failure_ms: u64,
}

impl Default for CooldownDurations {
    fn default() -> Self {
        Self {
            connection_reset_ms: 60_000,
            timeout_ms: 60_000,
            dns_failure_ms: 60_000,
        }
    }
}

/// Locations of the two persisted state documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub state_file: PathBuf,
    pub cooldown_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("checks.json"),
            cooldown_file: PathBuf::from("cooldowns.json"),
        }
    }
}

/// Driver loop cadence and the optional status API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Idle delay between cycles in milliseconds.
    pub poll_interval_ms: u64,
    /// Deferred-to-outstanding sweep cadence in milliseconds.
    pub sweep_interval_ms: u64,
    /// Port for the read-only status API. Disabled when unset.
    pub status_port: Option<u16>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            sweep_interval_ms: 60_000,
            status_port: None,
        }
    }
}

fn default_claim_batch() -> usize {
    5
}

impl CheckdConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CheckdConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// The configured backoff sequence, or the default when the
    /// configured one is empty.
    pub fn backoff_sequence(&self) -> Vec<u64> {
        if self.backoff_sequence.is_empty() {
            DEFAULT_BACKOFF_SEQUENCE.to_vec()
        } else {
            self.backoff_sequence.clone()
        }
    }
}
