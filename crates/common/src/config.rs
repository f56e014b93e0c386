//! Service configuration types.

use serde::{Deserialize, Serialize};

/// Top-level signal-desk configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeskConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream advisory feed settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Cache tier settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Background loop intervals (seconds).
    #[serde(default)]
    pub timing: TimingConfig,
}

/// HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. "0.0.0.0:8080".
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Browser origins allowed to call the API. Empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Upstream data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Travel advisory endpoint.
    #[serde(default = "default_advisory_url")]
    pub advisory_url: String,

    /// Whole-request timeout. A timeout is treated like any other fetch failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Cache tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Key for the advisory topic in both tiers.
    #[serde(default = "default_topic_key")]
    pub topic_key: String,

    /// Redis URL for the distributed tier. When unset an in-process
    /// stand-in is used.
    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_redis_pool_size")]
    pub redis_pool_size: usize,

    /// TTL handed to the distributed store on write.
    #[serde(default = "default_ttl_secs")]
    pub distributed_ttl_secs: u64,

    /// Max age of an in-process entry before it stops counting as a hit.
    #[serde(default = "default_ttl_secs")]
    pub memory_ttl_secs: u64,

    /// Cache-Control max-age advertised on fresh responses.
    #[serde(default = "default_fresh_max_age")]
    pub fresh_max_age_secs: u64,

    /// Cache-Control max-age advertised on stale responses.
    #[serde(default = "default_stale_max_age")]
    pub stale_max_age_secs: u64,
}

/// Background loop intervals (seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Score re-trigger interval. 0 disables the loop.
    #[serde(default = "default_score_refresh")]
    pub score_refresh_secs: u64,

    /// Advisory warm-up interval. 0 disables the loop.
    #[serde(default = "default_advisory_refresh")]
    pub advisory_refresh_secs: u64,

    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_bind_addr() -> String {
    "0.0.0.0:8080".into()
}

fn default_advisory_url() -> String {
    "https://www.travel-advisory.info/api".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "signal-desk/0.1".into()
}

fn default_topic_key() -> String {
    "travel:safety-scores:v1".into()
}
fn default_redis_pool_size() -> usize {
    8
}
fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}
fn default_fresh_max_age() -> u64 {
    3600
}
fn default_stale_max_age() -> u64 {
    300
}

fn default_score_refresh() -> u64 {
    300
}
fn default_advisory_refresh() -> u64 {
    3600
}
fn default_heartbeat() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            advisory_url: default_advisory_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            topic_key: default_topic_key(),
            redis_url: None,
            redis_pool_size: default_redis_pool_size(),
            distributed_ttl_secs: default_ttl_secs(),
            memory_ttl_secs: default_ttl_secs(),
            fresh_max_age_secs: default_fresh_max_age(),
            stale_max_age_secs: default_stale_max_age(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            score_refresh_secs: default_score_refresh(),
            advisory_refresh_secs: default_advisory_refresh(),
            heartbeat_secs: default_heartbeat(),
        }
    }
}
