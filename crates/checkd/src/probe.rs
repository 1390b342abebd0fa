//! Downstream existence probe.
//!
//! Asks the API service whether an identifier is already present in
//! the downstream database, so claims the fleet has already processed
//! are released instead of re-checked.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use check_core::ProbeConfig;
use check_store::{ExistenceProbe, ProbeVerdict};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Probes `GET {base_url}/profiles/{steam_id}`: 200 means the profile
/// exists downstream, 404 means it does not, anything else is a probe
/// failure.
pub struct HttpExistenceProbe {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpExistenceProbe {
    pub fn new(config: &ProbeConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ExistenceProbe for HttpExistenceProbe {
    async fn check(&self, steam_id: &str) -> ProbeVerdict {
        let url = format!("{}/profiles/{steam_id}", self.base_url);
        let response = match self
            .http
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return ProbeVerdict {
                    success: false,
                    exists: false,
                    error: Some(e.to_string()),
                };
            }
        };

        let status = response.status();
        debug!(%steam_id, status = status.as_u16(), "existence probe");
        match status.as_u16() {
            200 => ProbeVerdict {
                success: true,
                exists: true,
                error: None,
            },
            404 => ProbeVerdict {
                success: true,
                exists: false,
                error: None,
            },
            code => ProbeVerdict {
                success: false,
                exists: false,
                error: Some(format!("unexpected status {code}")),
            },
        }
    }
}
