//! Tessera Memstore — in-memory, process-local implementations of the
//! `tessera-core` store and adapter traits.
//!
//! These back the service layers in tests and single-replica
//! deployments. All maps are `DashMap`-based: linearizable per key,
//! readers never block each other. Counter and cache entries expire by
//! `tokio::time::Instant` deadline, so tests can drive expiry with
//! paused time.

mod adapter;
mod audit;
mod cache;
mod counter;
mod flag;
mod tenant;
mod usage;

pub use adapter::RecordingAdapter;
pub use audit::MemoryAuditSink;
pub use cache::MemoryCacheStore;
pub use counter::MemoryCounterStore;
pub use flag::MemoryFlagStore;
pub use tenant::MemoryTenantStore;
pub use usage::MemoryUsageStore;
