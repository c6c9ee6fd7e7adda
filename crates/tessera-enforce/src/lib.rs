//! Tessera Enforce — the data-plane guardrails of the control plane:
//! per-minute rate enforcement with fail-open semantics, the
//! noisy-neighbor controller, per-tenant work queues, the autoscaling
//! policy, the blast-radius detector, and the tenant-scoped cache
//! facade.
//!
//! Enforcement decisions here are ephemeral and per-process; the
//! authoritative tenant state lives behind the `tessera-core` store
//! traits. Mitigations are shared through [`rate::ThrottleState`] so
//! the enforcer, the noisy-neighbor controller, and the blast-radius
//! detector all see the same overrides.

pub mod autoscale;
pub mod blast;
pub mod cache;
pub mod neighbor;
pub mod queue;
pub mod rate;
pub mod storage;

pub use autoscale::{AutoscalePolicy, ScaleDecision, TierScalePolicy};
pub use blast::{BlastConfig, BlastRadiusDetector, SignalSource};
pub use cache::{CacheConfig, TenantCache};
pub use neighbor::{NeighborConfig, NoisyNeighborController, Severity};
pub use queue::TenantQueueManager;
pub use rate::{Mitigation, RateDecision, RateEnforcer, ThrottleState};
pub use storage::StorageGuard;
