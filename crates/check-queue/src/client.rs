//! Queue service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use check_core::{QueueConfig, QueueItem, SteamId};
use check_store::CompletionSink;

/// The fixed queue this worker drains.
pub const QUEUE_NAME: &str = "validator";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by the queue client internals.
///
/// Callers of the public methods never see these: each method logs and
/// returns its safe default instead.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("failed to build http client: {0}")]
    Client(String),

    #[error("request error: {0}")]
    Request(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("queue service reported failure")]
    Rejected,
}

/// The queue operations the coordinator drives.
///
/// A trait seam so tests can script a queue without a network.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn claim_items(&self, count: usize) -> Vec<QueueItem>;
    async fn complete_items(&self, steam_ids: &[SteamId]) -> bool;
    async fn release_items(&self, steam_ids: &[SteamId]) -> bool;
    async fn release_instance(&self) -> u64;
}

/// Thin client for the remote queue service.
#[derive(Clone)]
pub struct QueueClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    instance_id: String,
}

#[derive(Serialize)]
struct ClaimRequest<'a> {
    instance_id: &'a str,
    count: usize,
}

#[derive(Serialize)]
struct ItemsRequest<'a> {
    instance_id: &'a str,
    items: &'a [SteamId],
}

#[derive(Serialize)]
struct InstanceRequest<'a> {
    instance_id: &'a str,
}

#[derive(Deserialize)]
struct ClaimResponse {
    success: bool,
    #[serde(default)]
    items: Vec<QueueItem>,
}

#[derive(Deserialize)]
struct AckResponse {
    success: bool,
}

#[derive(Deserialize)]
struct ReleaseInstanceResponse {
    success: bool,
    #[serde(default)]
    released_count: u64,
}

#[derive(Deserialize)]
struct StatsResponse {
    success: bool,
    #[serde(default)]
    stats: Option<serde_json::Value>,
}

impl QueueClient {
    pub fn new(config: &QueueConfig) -> Result<Self, QueueError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| QueueError::Client(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            instance_id: config.instance_id.clone(),
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Claim up to `count` items. Empty on any failure.
    pub async fn claim_items(&self, count: usize) -> Vec<QueueItem> {
        let request = ClaimRequest {
            instance_id: &self.instance_id,
            count,
        };
        match self.post::<_, ClaimResponse>("claim", &request).await {
            Ok(response) => {
                debug!(claimed = response.items.len(), "items claimed");
                response.items
            }
            Err(e) => {
                warn!(error = %e, "claim failed");
                Vec::new()
            }
        }
    }

    /// Acknowledge fully processed items. False on any failure.
    pub async fn complete_items(&self, steam_ids: &[SteamId]) -> bool {
        let request = ItemsRequest {
            instance_id: &self.instance_id,
            items: steam_ids,
        };
        match self.post::<_, AckResponse>("complete", &request).await {
            Ok(_) => {
                debug!(items = steam_ids.len(), "items completed");
                true
            }
            Err(e) => {
                warn!(error = %e, items = ?steam_ids, "complete failed");
                false
            }
        }
    }

    /// Return unprocessed items to the shared queue. False on any failure.
    pub async fn release_items(&self, steam_ids: &[SteamId]) -> bool {
        let request = ItemsRequest {
            instance_id: &self.instance_id,
            items: steam_ids,
        };
        match self.post::<_, AckResponse>("release", &request).await {
            Ok(_) => {
                debug!(items = steam_ids.len(), "items released");
                true
            }
            Err(e) => {
                warn!(error = %e, items = ?steam_ids, "release failed");
                false
            }
        }
    }

    /// Return every item claimed under this instance identity, for
    /// crash recovery at startup. Zero on any failure.
    pub async fn release_instance(&self) -> u64 {
        let request = InstanceRequest {
            instance_id: &self.instance_id,
        };
        match self
            .post::<_, ReleaseInstanceResponse>("release-instance", &request)
            .await
        {
            Ok(response) => {
                info!(
                    released = response.released_count,
                    "orphaned claims released"
                );
                response.released_count
            }
            Err(e) => {
                warn!(error = %e, "release-instance failed");
                0
            }
        }
    }

    /// Queue-wide statistics, for inspection tooling. None on any failure.
    pub async fn stats(&self) -> Option<serde_json::Value> {
        let url = format!("{}/queue/{QUEUE_NAME}/stats", self.base_url);
        let result = async {
            let response = self
                .http
                .get(&url)
                .header("X-API-Key", &self.api_key)
                .send()
                .await
                .map_err(|e| QueueError::Request(e.to_string()))?;
            parse_envelope::<StatsResponse>(response).await
        }
        .await;

        match result {
            Ok(response) => response.stats,
            Err(e) => {
                warn!(error = %e, "stats failed");
                None
            }
        }
    }

    async fn post<Req, Resp>(&self, action: &str, body: &Req) -> Result<Resp, QueueError>
    where
        Req: Serialize,
        Resp: DeserializeOwned + Envelope,
    {
        let url = format!("{}/queue/{QUEUE_NAME}/{action}", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| QueueError::Request(e.to_string()))?;
        parse_envelope(response).await
    }
}

/// Every queue response carries a `success` flag; a response only
/// counts as success when the status is 200 AND the flag is set.
trait Envelope {
    fn success(&self) -> bool;
}

impl Envelope for ClaimResponse {
    fn success(&self) -> bool {
        self.success
    }
}

impl Envelope for AckResponse {
    fn success(&self) -> bool {
        self.success
    }
}

impl Envelope for ReleaseInstanceResponse {
    fn success(&self) -> bool {
        self.success
    }
}

impl Envelope for StatsResponse {
    fn success(&self) -> bool {
        self.success
    }
}

async fn parse_envelope<Resp>(response: reqwest::Response) -> Result<Resp, QueueError>
where
    Resp: DeserializeOwned + Envelope,
{
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(QueueError::Status(status.as_u16()));
    }
    let parsed: Resp = response
        .json()
        .await
        .map_err(|e| QueueError::Parse(e.to_string()))?;
    if !parsed.success() {
        return Err(QueueError::Rejected);
    }
    Ok(parsed)
}

#[async_trait]
impl WorkQueue for QueueClient {
    async fn claim_items(&self, count: usize) -> Vec<QueueItem> {
        QueueClient::claim_items(self, count).await
    }

    async fn complete_items(&self, steam_ids: &[SteamId]) -> bool {
        QueueClient::complete_items(self, steam_ids).await
    }

    async fn release_items(&self, steam_ids: &[SteamId]) -> bool {
        QueueClient::release_items(self, steam_ids).await
    }

    async fn release_instance(&self) -> u64 {
        QueueClient::release_instance(self).await
    }
}

#[async_trait]
impl CompletionSink for QueueClient {
    async fn complete_items(&self, steam_ids: &[SteamId]) -> bool {
        QueueClient::complete_items(self, steam_ids).await
    }
}
