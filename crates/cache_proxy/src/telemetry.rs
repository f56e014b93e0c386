//! Cache-outcome telemetry.
//!
//! Recording is best-effort: the trait has no error channel and the proxy
//! shields callers from panicking collectors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::info;

/// Which path served (or failed) a snapshot request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOutcome {
    DistributedHit,
    MemoryHit,
    Miss,
    Stale,
    Error,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::DistributedHit => "DISTRIBUTED-HIT",
            CacheOutcome::MemoryHit => "MEMORY-HIT",
            CacheOutcome::Miss => "MISS",
            CacheOutcome::Stale => "STALE",
            CacheOutcome::Error => "ERROR",
        }
    }
}

impl fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait CacheTelemetry: Send + Sync {
    fn record_outcome(&self, topic: &str, outcome: CacheOutcome);
}

/// Emits one structured log event per outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl CacheTelemetry for TracingTelemetry {
    fn record_outcome(&self, topic: &str, outcome: CacheOutcome) {
        info!(topic = %topic, outcome = outcome.as_str(), "cache outcome");
    }
}

/// Per-topic outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeTally {
    pub distributed_hit: u64,
    pub memory_hit: u64,
    pub miss: u64,
    pub stale: u64,
    pub error: u64,
}

impl OutcomeTally {
    pub fn total(&self) -> u64 {
        self.distributed_hit + self.memory_hit + self.miss + self.stale + self.error
    }

    fn bump(&mut self, outcome: CacheOutcome) {
        let slot = match outcome {
            CacheOutcome::DistributedHit => &mut self.distributed_hit,
            CacheOutcome::MemoryHit => &mut self.memory_hit,
            CacheOutcome::Miss => &mut self.miss,
            CacheOutcome::Stale => &mut self.stale,
            CacheOutcome::Error => &mut self.error,
        };
        *slot = slot.saturating_add(1);
    }
}

/// In-process counters, read by the heartbeat and the stats route.
#[derive(Debug, Default)]
pub struct OutcomeCounters {
    tallies: DashMap<String, OutcomeTally>,
}

impl OutcomeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tally(&self, topic: &str) -> OutcomeTally {
        self.tallies.get(topic).map(|t| *t).unwrap_or_default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, OutcomeTally> {
        self.tallies
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    pub fn reset(&self) {
        self.tallies.clear();
    }
}

impl CacheTelemetry for OutcomeCounters {
    fn record_outcome(&self, topic: &str, outcome: CacheOutcome) {
        self.tallies.entry(topic.to_string()).or_default().bump(outcome);
    }
}

/// Forwards every outcome to each inner collector.
#[derive(Clone, Default)]
pub struct FanoutTelemetry {
    sinks: Vec<Arc<dyn CacheTelemetry>>,
}

impl FanoutTelemetry {
    pub fn new(sinks: Vec<Arc<dyn CacheTelemetry>>) -> Self {
        Self { sinks }
    }
}

impl CacheTelemetry for FanoutTelemetry {
    fn record_outcome(&self, topic: &str, outcome: CacheOutcome) {
        for sink in &self.sinks {
            sink.record_outcome(topic, outcome);
        }
    }
}
