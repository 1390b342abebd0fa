//! Domain types for the steamcheck worker.
//!
//! These types represent the persisted state of claimed profiles and
//! endpoint cooldowns, plus the wire shapes exchanged with the remote
//! work queue. All types are serializable to/from JSON for storage in
//! the on-disk state documents.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Opaque Steam identifier, the primary key of a profile.
pub type SteamId = String;

/// Username substituted when a claimed item arrives without one.
pub const DEFAULT_USERNAME: &str = "Professor";

// ── Checks ─────────────────────────────────────────────────────────

/// The closed set of per-profile checks, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    AnimatedAvatar,
    AvatarFrame,
    MiniProfileBackground,
    ProfileBackground,
    SteamLevel,
    Friends,
    CsgoInventory,
}

impl CheckName {
    /// Every check, in display order.
    pub const ALL: [CheckName; 7] = [
        CheckName::AnimatedAvatar,
        CheckName::AvatarFrame,
        CheckName::MiniProfileBackground,
        CheckName::ProfileBackground,
        CheckName::SteamLevel,
        CheckName::Friends,
        CheckName::CsgoInventory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckName::AnimatedAvatar => "animated_avatar",
            CheckName::AvatarFrame => "avatar_frame",
            CheckName::MiniProfileBackground => "mini_profile_background",
            CheckName::ProfileBackground => "profile_background",
            CheckName::SteamLevel => "steam_level",
            CheckName::Friends => "friends",
            CheckName::CsgoInventory => "csgo_inventory",
        }
    }

    /// The upstream endpoint this check issues requests against.
    pub fn endpoint(&self) -> EndpointName {
        match self {
            CheckName::AnimatedAvatar => EndpointName::AnimatedAvatar,
            CheckName::AvatarFrame => EndpointName::AvatarFrame,
            CheckName::MiniProfileBackground => EndpointName::MiniProfileBackground,
            CheckName::ProfileBackground => EndpointName::ProfileBackground,
            CheckName::SteamLevel => EndpointName::SteamLevel,
            CheckName::Friends => EndpointName::Friends,
            CheckName::CsgoInventory => EndpointName::Inventory,
        }
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Work outstanding (initial state).
    ToCheck,
    /// Terminal success.
    Passed,
    /// Terminal failure.
    Failed,
    /// Temporarily suspended, usually by an endpoint cooldown.
    Deferred,
}

impl CheckStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckStatus::Passed | CheckStatus::Failed)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckStatus::ToCheck => "to_check",
            CheckStatus::Passed => "passed",
            CheckStatus::Failed => "failed",
            CheckStatus::Deferred => "deferred",
        };
        f.write_str(s)
    }
}

/// The full check mapping of a profile.
///
/// One field per check, so every profile carries exactly the closed
/// check set: no missing keys, no extra keys, and unknown keys are
/// rejected at deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckSet {
    pub animated_avatar: CheckStatus,
    pub avatar_frame: CheckStatus,
    pub mini_profile_background: CheckStatus,
    pub profile_background: CheckStatus,
    pub steam_level: CheckStatus,
    pub friends: CheckStatus,
    pub csgo_inventory: CheckStatus,
}

impl CheckSet {
    /// A fresh check set with every check outstanding.
    pub fn new() -> Self {
        Self {
            animated_avatar: CheckStatus::ToCheck,
            avatar_frame: CheckStatus::ToCheck,
            mini_profile_background: CheckStatus::ToCheck,
            profile_background: CheckStatus::ToCheck,
            steam_level: CheckStatus::ToCheck,
            friends: CheckStatus::ToCheck,
            csgo_inventory: CheckStatus::ToCheck,
        }
    }

    pub fn get(&self, check: CheckName) -> CheckStatus {
        match check {
            CheckName::AnimatedAvatar => self.animated_avatar,
            CheckName::AvatarFrame => self.avatar_frame,
            CheckName::MiniProfileBackground => self.mini_profile_background,
            CheckName::ProfileBackground => self.profile_background,
            CheckName::SteamLevel => self.steam_level,
            CheckName::Friends => self.friends,
            CheckName::CsgoInventory => self.csgo_inventory,
        }
    }

    pub fn set(&mut self, check: CheckName, status: CheckStatus) {
        let slot = match check {
            CheckName::AnimatedAvatar => &mut self.animated_avatar,
            CheckName::AvatarFrame => &mut self.avatar_frame,
            CheckName::MiniProfileBackground => &mut self.mini_profile_background,
            CheckName::ProfileBackground => &mut self.profile_background,
            CheckName::SteamLevel => &mut self.steam_level,
            CheckName::Friends => &mut self.friends,
            CheckName::CsgoInventory => &mut self.csgo_inventory,
        };
        *slot = status;
    }

    /// Iterate every (check, status) pair in display order.
    pub fn iter(&self) -> impl Iterator<Item = (CheckName, CheckStatus)> + '_ {
        CheckName::ALL.iter().map(move |&c| (c, self.get(c)))
    }

    pub fn any(&self, status: CheckStatus) -> bool {
        self.iter().any(|(_, s)| s == status)
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.iter().filter(|&(_, s)| s == status).count()
    }

    /// True when every check is `passed` or `failed`.
    pub fn all_terminal(&self) -> bool {
        self.iter().all(|(_, s)| s.is_terminal())
    }
}

impl Default for CheckSet {
    fn default() -> Self {
        Self::new()
    }
}

// ── Profile ────────────────────────────────────────────────────────

/// One claimed identifier and the status of each of its checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub steam_id: SteamId,
    pub username: String,
    /// Unix timestamp (milliseconds) set at insertion.
    pub timestamp: u64,
    pub checks: CheckSet,
}

impl Profile {
    /// Build a fresh profile with all checks outstanding.
    ///
    /// A missing or blank username is rewritten to [`DEFAULT_USERNAME`].
    pub fn new(steam_id: impl Into<SteamId>, username: Option<&str>, timestamp: u64) -> Self {
        let username = match username {
            Some(u) if !u.trim().is_empty() => u.to_string(),
            _ => DEFAULT_USERNAME.to_string(),
        };
        Self {
            steam_id: steam_id.into(),
            username,
            timestamp,
            checks: CheckSet::new(),
        }
    }
}

// ── Endpoints ──────────────────────────────────────────────────────

/// Upstream endpoints subject to cooldowns, plus the `other` fall-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointName {
    Friends,
    Inventory,
    SteamLevel,
    AnimatedAvatar,
    AvatarFrame,
    MiniProfileBackground,
    ProfileBackground,
    Other,
}

impl EndpointName {
    /// Every endpoint, in classification precedence order.
    pub const ALL: [EndpointName; 8] = [
        EndpointName::Friends,
        EndpointName::Inventory,
        EndpointName::SteamLevel,
        EndpointName::AnimatedAvatar,
        EndpointName::AvatarFrame,
        EndpointName::MiniProfileBackground,
        EndpointName::ProfileBackground,
        EndpointName::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointName::Friends => "friends",
            EndpointName::Inventory => "inventory",
            EndpointName::SteamLevel => "steam_level",
            EndpointName::AnimatedAvatar => "animated_avatar",
            EndpointName::AvatarFrame => "avatar_frame",
            EndpointName::MiniProfileBackground => "mini_profile_background",
            EndpointName::ProfileBackground => "profile_background",
            EndpointName::Other => "other",
        }
    }

    /// Map an upstream request URL to its endpoint by substring probe,
    /// first match wins.
    pub fn from_url(url: &str) -> EndpointName {
        const PROBES: [(&str, EndpointName); 7] = [
            ("GetFriendList", EndpointName::Friends),
            ("inventory", EndpointName::Inventory),
            ("GetSteamLevel", EndpointName::SteamLevel),
            ("GetAnimatedAvatar", EndpointName::AnimatedAvatar),
            ("GetAvatarFrame", EndpointName::AvatarFrame),
            ("GetMiniProfileBackground", EndpointName::MiniProfileBackground),
            ("GetProfileBackground", EndpointName::ProfileBackground),
        ];
        for (needle, endpoint) in PROBES {
            if url.contains(needle) {
                return endpoint;
            }
        }
        EndpointName::Other
    }

    /// Request timeout for this endpoint. Inventory responses are large
    /// and slow, so it gets a longer budget.
    pub fn request_timeout(&self) -> Duration {
        match self {
            EndpointName::Inventory => Duration::from_millis(25_000),
            _ => Duration::from_millis(15_000),
        }
    }
}

impl fmt::Display for EndpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Cooldowns ──────────────────────────────────────────────────────

/// Why an endpoint is in cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownReason {
    /// Upstream signaled HTTP 429; duration escalates per backoff level.
    #[serde(rename = "429")]
    RateLimited,
    ConnectionError,
    Timeout,
    DnsFailure,
}

impl fmt::Display for CooldownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CooldownReason::RateLimited => "429",
            CooldownReason::ConnectionError => "connection_error",
            CooldownReason::Timeout => "timeout",
            CooldownReason::DnsFailure => "dns_failure",
        };
        f.write_str(s)
    }
}

/// A persisted cooldown record for one endpoint.
///
/// 429 records carry `backoff_level` and `duration_minutes`; fixed-duration
/// records carry `duration_used` (milliseconds) instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCooldown {
    /// Absolute epoch-ms deadline after which the endpoint is usable again.
    pub cooldown_until: u64,
    pub reason: CooldownReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_level: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_used: Option<u64>,
    /// Unix timestamp (milliseconds) when the cooldown was applied.
    pub applied_at: u64,
    pub error_message: String,
}

// ── Queue wire types ───────────────────────────────────────────────

/// One item handed out by the remote work queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: SteamId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

// ── Upstream errors ────────────────────────────────────────────────

/// A failed upstream request, as handed to the cooldown classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError {
    /// HTTP status if the upstream responded at all.
    pub status: Option<u16>,
    pub message: String,
    /// The request URL, used to attribute the error to an endpoint.
    pub url: String,
}

impl UpstreamError {
    pub fn rate_limited(url: impl Into<String>) -> Self {
        Self {
            status: Some(429),
            message: "429 Too Many Requests".to_string(),
            url: url.into(),
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "HTTP {code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}
