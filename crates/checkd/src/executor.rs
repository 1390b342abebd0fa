//! Upstream check execution.
//!
//! The coordinator only needs a seam that runs one check and reports
//! its outcome; interpreting response bodies is the business of each
//! check. The built-in [`HttpCheckExecutor`] maps HTTP status classes
//! to outcomes and hands everything else to the cooldown classifier.

use async_trait::async_trait;
use tracing::debug;

use check_core::{CheckName, UpstreamConfig, UpstreamError};

/// Outcome of a single check execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Terminal success.
    Passed,
    /// Terminal, deterministic failure.
    Failed,
    /// The request itself failed; the cooldown controller classifies it.
    Upstream(UpstreamError),
}

/// Executes one named check against the upstream service.
#[async_trait]
pub trait CheckExecutor: Send + Sync {
    async fn execute(&self, steam_id: &str, check: CheckName) -> CheckOutcome;
}

/// Default executor: issues the check's request and maps the response
/// status. 2xx passes, 4xx (other than 429) fails deterministically,
/// and everything else is surfaced for cooldown classification.
pub struct HttpCheckExecutor {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl HttpCheckExecutor {
    pub fn new(config: UpstreamConfig) -> anyhow::Result<Self> {
        // Timeouts are per-endpoint, set on each request.
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, config })
    }

    /// The request URL for one check. The method path is what the
    /// cooldown controller's endpoint extraction keys on.
    fn check_url(&self, steam_id: &str, check: CheckName) -> String {
        let api = self.config.api_base_url.trim_end_matches('/');
        let community = self.config.community_base_url.trim_end_matches('/');
        let key = &self.config.api_key;
        match check {
            CheckName::AnimatedAvatar => format!(
                "{api}/IPlayerService/GetAnimatedAvatar/v1/?key={key}&steamid={steam_id}"
            ),
            CheckName::AvatarFrame => format!(
                "{api}/IPlayerService/GetAvatarFrame/v1/?key={key}&steamid={steam_id}"
            ),
            CheckName::MiniProfileBackground => format!(
                "{api}/IPlayerService/GetMiniProfileBackground/v1/?key={key}&steamid={steam_id}"
            ),
            CheckName::ProfileBackground => format!(
                "{api}/IPlayerService/GetProfileBackground/v1/?key={key}&steamid={steam_id}"
            ),
            CheckName::SteamLevel => format!(
                "{api}/IPlayerService/GetSteamLevel/v1/?key={key}&steamid={steam_id}"
            ),
            CheckName::Friends => format!(
                "{api}/ISteamUser/GetFriendList/v1/?key={key}&steamid={steam_id}"
            ),
            CheckName::CsgoInventory => format!("{community}/inventory/{steam_id}/730/2"),
        }
    }
}

#[async_trait]
impl CheckExecutor for HttpCheckExecutor {
    async fn execute(&self, steam_id: &str, check: CheckName) -> CheckOutcome {
        let url = self.check_url(steam_id, check);
        let timeout = check.endpoint().request_timeout();

        let response = match self.http.get(&url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                return CheckOutcome::Upstream(UpstreamError {
                    status: None,
                    message: e.to_string(),
                    url,
                });
            }
        };

        let status = response.status();
        debug!(%steam_id, %check, status = status.as_u16(), "check executed");

        if status.is_success() {
            CheckOutcome::Passed
        } else if status.is_client_error() && status.as_u16() != 429 {
            CheckOutcome::Failed
        } else {
            CheckOutcome::Upstream(UpstreamError {
                status: Some(status.as_u16()),
                message: format!("HTTP {status}"),
                url,
            })
        }
    }
}
