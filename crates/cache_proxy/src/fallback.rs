//! In-process fallback cache.
//!
//! Uses `DashMap` so concurrent handlers can read and swap entries
//! without a global lock. Entries are replaced wholesale, never merged.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::Snapshot;
use dashmap::DashMap;

/// A stored snapshot with age tracking.
#[derive(Debug, Clone)]
pub struct CachedPayload<R> {
    pub key: String,
    pub data: Arc<Snapshot<R>>,
    pub stored_at: Instant,
}

impl<R> CachedPayload<R> {
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    /// Fresh while strictly younger than `ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Process-wide fallback keyed by topic.
///
/// Constructed explicitly and shared via `Arc`; `reset` is the teardown
/// hook so tests and restarts start from an empty tier.
#[derive(Debug)]
pub struct FallbackCache<R> {
    entries: DashMap<String, CachedPayload<R>>,
}

impl<R: Clone> FallbackCache<R> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Latest payload for `key`, regardless of age.
    pub fn get(&self, key: &str) -> Option<CachedPayload<R>> {
        self.entries.get(key).map(|e| e.clone())
    }

    /// Latest payload for `key` only if it is younger than `ttl`.
    pub fn get_fresh(&self, key: &str, ttl: Duration) -> Option<CachedPayload<R>> {
        self.entries
            .get(key)
            .filter(|e| e.is_fresh(ttl))
            .map(|e| e.clone())
    }

    /// Swap in a new payload. Last writer wins.
    pub fn store(&self, key: &str, data: Arc<Snapshot<R>>) {
        self.entries.insert(
            key.to_string(),
            CachedPayload {
                key: key.to_string(),
                data,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn reset(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<R: Clone> Default for FallbackCache<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn snapshot(values: &[(&str, u32)]) -> Arc<Snapshot<u32>> {
        let data: BTreeMap<String, u32> =
            values.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Arc::new(Snapshot::new(data, Utc::now()))
    }

    #[test]
    fn test_store_then_get() {
        let cache = FallbackCache::new();
        cache.store("topic", snapshot(&[("a", 1)]));

        let entry = cache.get("topic").expect("entry present");
        assert_eq!(entry.key, "topic");
        assert_eq!(entry.data.count, 1);
        assert!(cache.get("other").is_none());
    }

    #[test]
    fn test_zero_ttl_is_never_fresh() {
        let cache = FallbackCache::new();
        cache.store("topic", snapshot(&[("a", 1)]));

        assert!(cache.get_fresh("topic", Duration::ZERO).is_none());
        assert!(cache.get_fresh("topic", Duration::from_secs(60)).is_some());
        // Still served on the stale path.
        assert!(cache.get("topic").is_some());
    }

    #[test]
    fn test_store_replaces_wholesale() {
        let cache = FallbackCache::new();
        cache.store("topic", snapshot(&[("a", 1), ("b", 2)]));
        cache.store("topic", snapshot(&[("c", 3)]));

        let entry = cache.get("topic").unwrap();
        assert_eq!(entry.data.count, 1);
        assert!(entry.data.data.contains_key("c"));
        assert!(!entry.data.data.contains_key("a"));
    }

    #[test]
    fn test_reset_clears_every_topic() {
        let cache = FallbackCache::new();
        cache.store("one", snapshot(&[("a", 1)]));
        cache.store("two", snapshot(&[("b", 2)]));
        assert_eq!(cache.len(), 2);

        cache.reset();
        assert!(cache.is_empty());
    }
}
