//! Snapshot lookup across the cache tiers.
//!
//! Precedence: distributed cache → fresh in-process fallback → live
//! upstream fetch → in-process fallback of any age. Exactly one telemetry
//! outcome is recorded per call.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::config::CacheConfig;
use common::{Error, Result, Snapshot};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::distributed::DistributedCache;
use crate::fallback::FallbackCache;
use crate::telemetry::{CacheOutcome, CacheTelemetry};

/// An upstream that can produce a normalized record set.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    type Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Fetch and normalize. Any error here sends the proxy down the stale path.
    async fn fetch_records(&self) -> Result<BTreeMap<String, Self::Record>>;
}

/// Tier that produced a successful response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    DistributedHit,
    MemoryHit,
    Miss,
    Stale,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        self.outcome().as_str()
    }

    pub fn outcome(&self) -> CacheOutcome {
        match self {
            Origin::DistributedHit => CacheOutcome::DistributedHit,
            Origin::MemoryHit => CacheOutcome::MemoryHit,
            Origin::Miss => CacheOutcome::Miss,
            Origin::Stale => CacheOutcome::Stale,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Origin::Stale)
    }
}

/// TTLs and the caller-facing freshness hints.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub distributed_ttl: Duration,
    pub memory_ttl: Duration,
    pub fresh_max_age: Duration,
    pub stale_max_age: Duration,
}

impl CachePolicy {
    pub fn from_config(cfg: &CacheConfig) -> Self {
        Self {
            distributed_ttl: Duration::from_secs(cfg.distributed_ttl_secs),
            memory_ttl: Duration::from_secs(cfg.memory_ttl_secs),
            fresh_max_age: Duration::from_secs(cfg.fresh_max_age_secs),
            stale_max_age: Duration::from_secs(cfg.stale_max_age_secs),
        }
    }

    /// Suggested re-check interval for a response from `origin`.
    pub fn max_age(&self, origin: Origin) -> Duration {
        if origin.is_stale() {
            self.stale_max_age
        } else {
            self.fresh_max_age
        }
    }

    pub fn cache_control(&self, origin: Origin) -> String {
        format!("public, max-age={}", self.max_age(origin).as_secs())
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

/// Serves one topic's snapshot from the cheapest tier available.
pub struct TieredCacheProxy<S: SnapshotSource> {
    topic: String,
    source: S,
    distributed: Arc<dyn DistributedCache>,
    fallback: Arc<FallbackCache<S::Record>>,
    telemetry: Arc<dyn CacheTelemetry>,
    policy: CachePolicy,
}

impl<S: SnapshotSource> TieredCacheProxy<S> {
    pub fn new(
        topic: impl Into<String>,
        source: S,
        distributed: Arc<dyn DistributedCache>,
        fallback: Arc<FallbackCache<S::Record>>,
        telemetry: Arc<dyn CacheTelemetry>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            topic: topic.into(),
            source,
            distributed,
            fallback,
            telemetry,
            policy,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn fallback(&self) -> &Arc<FallbackCache<S::Record>> {
        &self.fallback
    }

    /// Current snapshot and the tier that served it.
    ///
    /// Only fails with `Error::NoDataAvailable` when the upstream is down
    /// and nothing has ever been cached in this process.
    pub async fn get_snapshot(&self) -> Result<(Arc<Snapshot<S::Record>>, Origin)> {
        // 1. Distributed tier.
        if let Some(value) = self.distributed.get_cached_json(&self.topic).await {
            match serde_json::from_value::<Snapshot<S::Record>>(value) {
                Ok(snapshot) => {
                    debug!(topic = %self.topic, count = snapshot.count, "distributed cache hit");
                    self.record(CacheOutcome::DistributedHit);
                    return Ok((Arc::new(snapshot), Origin::DistributedHit));
                }
                Err(e) => {
                    warn!(topic = %self.topic, error = %e, "Ignoring undecodable distributed entry");
                }
            }
        }

        // 2. Fresh in-process fallback.
        if let Some(entry) = self.fallback.get_fresh(&self.topic, self.policy.memory_ttl) {
            debug!(topic = %self.topic, age_secs = entry.age().as_secs(), "memory cache hit");
            self.record(CacheOutcome::MemoryHit);
            return Ok((entry.data, Origin::MemoryHit));
        }

        // 3. Live fetch.
        match self.source.fetch_records().await {
            Ok(records) => {
                let snapshot = Arc::new(Snapshot::new(records, Utc::now()));
                // Visible to this process before the distributed write lands.
                self.fallback.store(&self.topic, Arc::clone(&snapshot));
                self.spawn_distributed_write(&snapshot);

                info!(topic = %self.topic, count = snapshot.count, "cache miss, fetched upstream");
                self.record(CacheOutcome::Miss);
                Ok((snapshot, Origin::Miss))
            }
            Err(e) => {
                // 4. Degrade to whatever we saw last.
                if let Some(entry) = self.fallback.get(&self.topic) {
                    warn!(
                        topic = %self.topic,
                        error = %e,
                        age_secs = entry.age().as_secs(),
                        "Upstream fetch failed, serving stale snapshot"
                    );
                    self.record(CacheOutcome::Stale);
                    return Ok((entry.data, Origin::Stale));
                }

                warn!(topic = %self.topic, error = %e, "Upstream fetch failed with no cached data");
                self.record(CacheOutcome::Error);
                Err(Error::NoDataAvailable(e.to_string()))
            }
        }
    }

    fn spawn_distributed_write(&self, snapshot: &Snapshot<S::Record>) {
        let value = match serde_json::to_value(snapshot) {
            Ok(v) => v,
            Err(e) => {
                warn!(topic = %self.topic, error = %e, "Snapshot not serializable, skipping distributed write");
                return;
            }
        };

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                warn!(topic = %self.topic, "No async runtime, skipping distributed write");
                return;
            }
        };

        let distributed = Arc::clone(&self.distributed);
        let key = self.topic.clone();
        let ttl_secs = self.policy.distributed_ttl.as_secs();
        handle.spawn(async move {
            if let Err(e) = distributed.set_cached_json(&key, value, ttl_secs).await {
                warn!(key = %key, error = %e, "Distributed cache write failed");
            }
        });
    }

    fn record(&self, outcome: CacheOutcome) {
        let recorded = catch_unwind(AssertUnwindSafe(|| {
            self.telemetry.record_outcome(&self.topic, outcome)
        }));
        if recorded.is_err() {
            warn!(topic = %self.topic, outcome = outcome.as_str(), "Telemetry collector panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::{DisabledCache, MemoryDistributedCache};
    use crate::telemetry::OutcomeCounters;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    const TOPIC: &str = "test:topic:v1";

    /// Replays scripted fetch results, then keeps failing.
    #[derive(Default)]
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<BTreeMap<String, u32>>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<BTreeMap<String, u32>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SnapshotSource for Arc<ScriptedSource> {
        type Record = u32;

        async fn fetch_records(&self) -> Result<BTreeMap<String, u32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(Error::Http("connection refused".into())))
        }
    }

    /// Counts calls, then panics.
    #[derive(Default)]
    struct PanickingTelemetry {
        calls: AtomicUsize,
    }

    impl CacheTelemetry for PanickingTelemetry {
        fn record_outcome(&self, _topic: &str, _outcome: CacheOutcome) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("collector down");
        }
    }

    /// Distributed tier whose writes always fail.
    #[derive(Default)]
    struct BrokenWrites {
        attempts: AtomicUsize,
        failed: Notify,
    }

    #[async_trait]
    impl DistributedCache for BrokenWrites {
        async fn get_cached_json(&self, _key: &str) -> Option<serde_json::Value> {
            None
        }

        async fn set_cached_json(&self, _key: &str, _value: serde_json::Value, _ttl: u64) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.failed.notify_one();
            Err(Error::Cache("read-only replica".into()))
        }
    }

    fn records(pairs: &[(&str, u32)]) -> BTreeMap<String, u32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    struct Harness {
        proxy: TieredCacheProxy<Arc<ScriptedSource>>,
        source: Arc<ScriptedSource>,
        distributed: Arc<MemoryDistributedCache>,
        counters: Arc<OutcomeCounters>,
    }

    fn harness(script: Vec<Result<BTreeMap<String, u32>>>, memory_ttl: Duration) -> Harness {
        let source = Arc::new(ScriptedSource::new(script));
        let distributed = Arc::new(MemoryDistributedCache::new());
        let counters = Arc::new(OutcomeCounters::new());
        let policy = CachePolicy {
            memory_ttl,
            ..CachePolicy::default()
        };
        let proxy = TieredCacheProxy::new(
            TOPIC,
            Arc::clone(&source),
            distributed.clone(),
            Arc::new(FallbackCache::new()),
            counters.clone(),
            policy,
        );
        Harness {
            proxy,
            source,
            distributed,
            counters,
        }
    }

    async fn wait_for_distributed(cache: &MemoryDistributedCache, key: &str) -> bool {
        for _ in 0..100 {
            if cache.contains(key) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_cold_cache_miss_populates_both_tiers() {
        let h = harness(vec![Ok(records(&[("fr", 5), ("de", 1)]))], Duration::from_secs(60));

        let (snapshot, origin) = h.proxy.get_snapshot().await.unwrap();
        assert_eq!(origin, Origin::Miss);
        assert_eq!(snapshot.count, 2);

        // Fallback is written before get_snapshot returns.
        let entry = h.proxy.fallback().get(TOPIC).expect("fallback populated");
        assert_eq!(entry.data.data, snapshot.data);

        assert!(wait_for_distributed(&h.distributed, TOPIC).await);
        assert_eq!(h.counters.tally(TOPIC).miss, 1);
    }

    #[tokio::test]
    async fn test_fresh_fallback_skips_upstream() {
        let h = harness(vec![Ok(records(&[("fr", 5)]))], Duration::from_secs(60));
        h.proxy.get_snapshot().await.unwrap();
        // Keep the distributed tier out of the picture.
        assert!(wait_for_distributed(&h.distributed, TOPIC).await);
        h.distributed.clear();

        let (snapshot, origin) = h.proxy.get_snapshot().await.unwrap();
        assert_eq!(origin, Origin::MemoryHit);
        assert_eq!(snapshot.count, 1);
        assert_eq!(h.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.counters.tally(TOPIC).memory_hit, 1);
    }

    #[tokio::test]
    async fn test_distributed_hit_wins() {
        let h = harness(vec![], Duration::from_secs(60));
        let stored = Snapshot::new(records(&[("jp", 2)]), Utc::now());
        h.distributed
            .set_cached_json(TOPIC, serde_json::to_value(&stored).unwrap(), 60)
            .await
            .unwrap();

        let (snapshot, origin) = h.proxy.get_snapshot().await.unwrap();
        assert_eq!(origin, Origin::DistributedHit);
        assert_eq!(*snapshot, stored);
        assert_eq!(h.source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.counters.tally(TOPIC).distributed_hit, 1);
    }

    #[tokio::test]
    async fn test_undecodable_distributed_entry_reads_as_miss() {
        let h = harness(vec![Ok(records(&[("fr", 5)]))], Duration::from_secs(60));
        h.distributed
            .set_cached_json(TOPIC, serde_json::json!({"unexpected": true}), 60)
            .await
            .unwrap();

        let (_, origin) = h.proxy.get_snapshot().await.unwrap();
        assert_eq!(origin, Origin::Miss);
    }

    #[tokio::test]
    async fn test_upstream_failure_serves_stale_fallback() {
        // Zero TTL: the fallback is never fresh, so every call goes upstream.
        let h = harness(
            vec![
                Ok(records(&[("fr", 5), ("de", 1)])),
                Err(Error::UpstreamStatus { status: 503, body: "down".into() }),
            ],
            Duration::ZERO,
        );
        let (first, _) = h.proxy.get_snapshot().await.unwrap();
        assert!(wait_for_distributed(&h.distributed, TOPIC).await);
        h.distributed.clear();

        let (second, origin) = h.proxy.get_snapshot().await.unwrap();
        assert_eq!(origin, Origin::Stale);
        assert_eq!(*second, *first);
        assert_eq!(h.source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.counters.tally(TOPIC).stale, 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_without_fallback_is_error() {
        let h = harness(
            vec![Err(Error::UpstreamStatus { status: 502, body: "bad gateway".into() })],
            Duration::from_secs(60),
        );

        let err = h.proxy.get_snapshot().await.unwrap_err();
        assert!(matches!(err, Error::NoDataAvailable(_)));
        assert!(err.to_string().starts_with("Fetch failed: "));
        assert!(err.to_string().contains("502"));
        assert!(h.proxy.fallback().is_empty());
        assert_eq!(h.counters.tally(TOPIC).error, 1);
    }

    #[tokio::test]
    async fn test_next_call_retries_after_failure() {
        let h = harness(
            vec![
                Err(Error::Http("timeout".into())),
                Ok(records(&[("fr", 5)])),
            ],
            Duration::from_secs(60),
        );

        assert!(h.proxy.get_snapshot().await.is_err());
        let (_, origin) = h.proxy.get_snapshot().await.unwrap();
        assert_eq!(origin, Origin::Miss);
        assert_eq!(h.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_one_outcome_per_call() {
        let h = harness(vec![Ok(records(&[("fr", 5)]))], Duration::from_secs(60));
        for _ in 0..3 {
            h.proxy.get_snapshot().await.unwrap();
        }
        assert_eq!(h.counters.tally(TOPIC).total(), 3);
    }

    #[tokio::test]
    async fn test_failing_collaborators_do_not_fail_the_request() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(records(&[("fr", 5)]))]));
        let writes = Arc::new(BrokenWrites::default());
        let telemetry = Arc::new(PanickingTelemetry::default());
        let proxy = TieredCacheProxy::new(
            TOPIC,
            source,
            writes.clone(),
            Arc::new(FallbackCache::new()),
            telemetry.clone(),
            CachePolicy::default(),
        );

        let (snapshot, origin) = proxy.get_snapshot().await.unwrap();
        assert_eq!(origin, Origin::Miss);
        assert_eq!(snapshot.count, 1);
        assert_eq!(telemetry.calls.load(Ordering::SeqCst), 1);

        // The detached write must actually run and fail.
        tokio::time::timeout(Duration::from_secs(2), writes.failed.notified())
            .await
            .expect("distributed write attempted");
        assert_eq!(writes.attempts.load(Ordering::SeqCst), 1);

        // Still served from the fallback afterwards.
        let (_, origin) = proxy.get_snapshot().await.unwrap();
        assert_eq!(origin, Origin::MemoryHit);
        assert_eq!(telemetry.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disabled_distributed_tier() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(records(&[("fr", 5)]))]));
        let proxy = TieredCacheProxy::new(
            TOPIC,
            Arc::clone(&source),
            Arc::new(DisabledCache),
            Arc::new(FallbackCache::new()),
            Arc::new(OutcomeCounters::new()),
            CachePolicy::default(),
        );

        assert_eq!(proxy.get_snapshot().await.unwrap().1, Origin::Miss);
        assert_eq!(proxy.get_snapshot().await.unwrap().1, Origin::MemoryHit);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cache_control_by_origin() {
        let policy = CachePolicy::default();
        assert_eq!(policy.cache_control(Origin::Miss), "public, max-age=3600");
        assert_eq!(policy.cache_control(Origin::DistributedHit), "public, max-age=3600");
        assert_eq!(policy.cache_control(Origin::Stale), "public, max-age=300");
        assert_eq!(Origin::MemoryHit.as_str(), "MEMORY-HIT");
    }
}
