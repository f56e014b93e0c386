//! Tiered cache proxy.
//!
//! Fronts a slow upstream with a distributed cache, an in-process
//! fallback, and stale-data degradation when the upstream fails.

pub mod distributed;
pub mod fallback;
pub mod proxy;
pub mod telemetry;

pub use distributed::{DisabledCache, DistributedCache, MemoryDistributedCache, RedisCache};
pub use fallback::{CachedPayload, FallbackCache};
pub use proxy::{CachePolicy, Origin, SnapshotSource, TieredCacheProxy};
pub use telemetry::{
    CacheOutcome, CacheTelemetry, FanoutTelemetry, OutcomeCounters, OutcomeTally, TracingTelemetry,
};
