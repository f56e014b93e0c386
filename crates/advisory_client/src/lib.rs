//! Travel advisory API client.
//!
//! Fetches per-country safety scores (0–5 scale) and normalizes them
//! into `SafetyRecord`s for the cache proxy.

pub mod normalize;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use cache_proxy::SnapshotSource;
use common::config::UpstreamConfig;
use common::{Error, Result, SafetyRecord};
use tracing::debug;

pub use normalize::{coerce_score, normalize_body, normalize_entry};

/// Advisory API client with connection pooling and a bounded timeout.
#[derive(Debug, Clone)]
pub struct AdvisoryClient {
    client: reqwest::Client,
    url: String,
}

impl AdvisoryClient {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("failed to build advisory HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: cfg.advisory_url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the raw response body.
    pub async fn fetch_raw(&self) -> Result<serde_json::Value> {
        debug!("Fetching travel advisories: {}", self.url);

        let resp = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Http(format!("Travel API request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        resp.json()
            .await
            .map_err(|e| Error::MalformedPayload(format!("Travel API body is not JSON: {}", e)))
    }

    /// Fetch and normalize, keyed by country code.
    pub async fn fetch_advisories(&self) -> Result<BTreeMap<String, SafetyRecord>> {
        let body = self.fetch_raw().await?;
        let records = normalize_body(&body)?;
        debug!("Normalized {} advisory records", records.len());
        Ok(records)
    }
}

#[async_trait]
impl SnapshotSource for AdvisoryClient {
    type Record = SafetyRecord;

    async fn fetch_records(&self) -> Result<BTreeMap<String, SafetyRecord>> {
        self.fetch_advisories().await
    }
}
