//! Distributed cache tier.
//!
//! The proxy only needs JSON get/set-with-TTL. Expiry belongs to the store
//! itself; the proxy never checks the age of a distributed entry.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{Error, Result};
use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::{debug, warn};

#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Fetch a cached JSON document. Store errors are logged and read as a miss.
    async fn get_cached_json(&self, key: &str) -> Option<Value>;

    /// Write a JSON document with a store-enforced TTL.
    async fn set_cached_json(&self, key: &str, value: Value, ttl_secs: u64) -> Result<()>;
}

// ── Redis ─────────────────────────────────────────────────────────────

/// Redis-backed distributed tier.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool from a `redis://` URL. Does not connect yet.
    pub fn from_url(url: &str, pool_size: usize, timeout: Duration) -> Result<Self> {
        let mut redis_config = deadpool_redis::Config::from_url(url);
        let pool_config = redis_config
            .pool
            .get_or_insert_with(deadpool_redis::PoolConfig::default);
        pool_config.max_size = pool_size;
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| Error::Cache(format!("failed to create Redis pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Check out a connection to confirm Redis is reachable.
    pub async fn ping(&self) -> Result<()> {
        self.pool
            .get()
            .await
            .map(|_| ())
            .map_err(|e| Error::Cache(format!("Redis unavailable: {}", e)))
    }
}

#[async_trait]
impl DistributedCache for RedisCache {
    async fn get_cached_json(&self, key: &str) -> Option<Value> {
        let mut conn = match self.pool.get().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Failed to get Redis connection");
                return None;
            }
        };

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = %key, error = %e, "Redis value is not valid JSON");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Redis GET error");
                None
            }
        }
    }

    async fn set_cached_json(&self, key: &str, value: Value, ttl_secs: u64) -> Result<()> {
        let raw = serde_json::to_string(&value)?;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| Error::Cache(format!("Redis connection: {}", e)))?;

        conn.set_ex::<_, _, ()>(key, raw, ttl_secs)
            .await
            .map_err(|e| Error::Cache(format!("Redis SET {}: {}", key, e)))?;

        debug!(key = %key, ttl_secs, "distributed cache set");
        Ok(())
    }
}

// ── In-process stand-in ───────────────────────────────────────────────

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Value,
    /// `None` when the TTL is past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Distributed-tier stand-in for single-instance deployments and tests.
///
/// Honors the TTL on read like Redis would.
#[derive(Debug, Default)]
pub struct MemoryDistributedCache {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryDistributedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|e| e.is_live(Instant::now()))
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl DistributedCache for MemoryDistributedCache {
    async fn get_cached_json(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key)?;
        if !entry.is_live(Instant::now()) {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    async fn set_cached_json(&self, key: &str, value: Value, ttl_secs: u64) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: Instant::now().checked_add(Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }
}

/// Always misses; writes are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

#[async_trait]
impl DistributedCache for DisabledCache {
    async fn get_cached_json(&self, _key: &str) -> Option<Value> {
        None
    }

    async fn set_cached_json(&self, _key: &str, _value: Value, _ttl_secs: u64) -> Result<()> {
        Ok(())
    }
}
