//! Quota and rate enforcement.
//!
//! The enforcer increments a counter at `(tenant, minute-bucket)` in a
//! shared counter store; the first increment of a bucket arms a 60 s
//! TTL. When the store is down the check **fails open**: the request
//! is allowed and a degraded-mode audit record is written, because the
//! noisy-neighbor controller provides backstop detection.
//!
//! Mitigations imposed by that controller (and by the blast-radius
//! detector) live in [`ThrottleState`], which the enforcer consults on
//! every check. A circuit-broken tenant is rejected with `Unavailable`
//! before any counter is touched.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tessera_control::audit::AuditTrail;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::usage::QuotaMetric;
use tessera_core::repository::{AuditSink, CounterStore};
use tokio::time::Instant;
use tracing::warn;

const MINUTE_SECS: u64 = 60;
const DAY_SECS: u64 = 86_400;

/// A temporary enforcement override for one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mitigation {
    /// Divide the effective per-minute limit.
    ReduceRate { divisor: u32 },
    /// Reject every request with `Unavailable`.
    CircuitBreak,
}

impl Mitigation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mitigation::ReduceRate { .. } => "reduce-rate",
            Mitigation::CircuitBreak => "circuit-break",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveOverride {
    mitigation: Mitigation,
    expires_at: Instant,
}

/// Per-tenant mitigation overrides, shared between the rate enforcer
/// and the controllers that impose them. Entries expire by deadline
/// and are reaped lazily, so limits restore without any sweeper.
#[derive(Default)]
pub struct ThrottleState {
    overrides: DashMap<String, ActiveOverride>,
}

impl ThrottleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Impose a mitigation for `window`, replacing any existing one.
    pub fn impose(&self, tenant_id: &str, mitigation: Mitigation, window: Duration) {
        self.overrides.insert(
            tenant_id.to_string(),
            ActiveOverride {
                mitigation,
                expires_at: Instant::now() + window,
            },
        );
    }

    /// The active mitigation, if any.
    pub fn current(&self, tenant_id: &str) -> Option<Mitigation> {
        let now = Instant::now();
        if let Some(entry) = self.overrides.get(tenant_id) {
            if entry.expires_at > now {
                return Some(entry.mitigation);
            }
        }
        self.overrides.remove_if(tenant_id, |_, o| o.expires_at <= now);
        None
    }

    pub fn is_circuit_broken(&self, tenant_id: &str) -> bool {
        matches!(self.current(tenant_id), Some(Mitigation::CircuitBreak))
    }

    /// Seconds until the active mitigation lapses, rounded up to at
    /// least one.
    pub fn remaining_secs(&self, tenant_id: &str) -> Option<u64> {
        let now = Instant::now();
        self.overrides.get(tenant_id).and_then(|o| {
            (o.expires_at > now).then(|| (o.expires_at - now).as_secs().max(1))
        })
    }

    /// Lift any mitigation, e.g. when a tenant is reactivated.
    pub fn clear(&self, tenant_id: &str) -> bool {
        self.overrides.remove(tenant_id).is_some()
    }
}

/// Outcome of a per-request rate check.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests observed in the current minute bucket, this one
    /// included. Zero when the check failed open.
    pub current: u64,
    pub remaining: u64,
    /// Seconds until the bucket rolls over; set only on rejection.
    pub retry_after_secs: Option<u64>,
}

pub struct RateEnforcer<C, A> {
    counters: Arc<C>,
    audit: AuditTrail<A>,
    throttle: Arc<ThrottleState>,
    /// Bucket indices are derived from elapsed time since construction
    /// so tests can drive window rollover with paused time.
    epoch: Instant,
}

impl<C: CounterStore, A: AuditSink> RateEnforcer<C, A> {
    pub fn new(counters: Arc<C>, audit: AuditTrail<A>, throttle: Arc<ThrottleState>) -> Self {
        Self {
            counters,
            audit,
            throttle,
            epoch: Instant::now(),
        }
    }

    pub fn throttle(&self) -> &Arc<ThrottleState> {
        &self.throttle
    }

    /// (bucket index, seconds left in the bucket)
    fn minute_bucket(&self) -> (u64, u64) {
        let elapsed = self.epoch.elapsed().as_secs();
        (elapsed / MINUTE_SECS, MINUTE_SECS - elapsed % MINUTE_SECS)
    }

    /// Admission check against a per-minute limit.
    ///
    /// `Err(Unavailable)` while the tenant is circuit-broken; a
    /// rejected-but-healthy check is `Ok` with `allowed = false`.
    pub async fn check(&self, tenant_id: &str, limit_per_minute: u32) -> TesseraResult<RateDecision> {
        let effective = match self.throttle.current(tenant_id) {
            Some(Mitigation::CircuitBreak) => {
                return Err(TesseraError::Unavailable {
                    reason: format!("tenant {tenant_id} is circuit-broken"),
                });
            }
            Some(Mitigation::ReduceRate { divisor }) => {
                (limit_per_minute / divisor.max(1)).max(1)
            }
            None => limit_per_minute,
        } as u64;

        let (bucket, secs_left) = self.minute_bucket();
        let key = format!("rate:{tenant_id}:{bucket}");
        let current = match self
            .counters
            .incr_with_ttl(&key, 1, Duration::from_secs(MINUTE_SECS))
            .await
        {
            Ok(count) => count.max(0) as u64,
            Err(err) => {
                warn!(tenant_id, error = %err, "counter store down, rate check fails open");
                self.audit
                    .degraded(tenant_id, "rate_check", "system", "counter store unavailable", false)
                    .await;
                return Ok(RateDecision {
                    allowed: true,
                    current: 0,
                    remaining: effective,
                    retry_after_secs: None,
                });
            }
        };

        let allowed = current <= effective;
        Ok(RateDecision {
            allowed,
            current,
            remaining: effective.saturating_sub(current),
            retry_after_secs: (!allowed).then_some(secs_left),
        })
    }

    /// Requests observed so far in the current minute bucket. Consumed
    /// by the noisy-neighbor controller's scan loop.
    pub async fn observed_qpm(&self, tenant_id: &str) -> TesseraResult<u64> {
        let (bucket, _) = self.minute_bucket();
        let key = format!("rate:{tenant_id}:{bucket}");
        Ok(self.counters.get(&key).await?.unwrap_or(0).max(0) as u64)
    }

    /// Record `amount` consumed units against a day-grained quota
    /// metric. The ceiling is the tenant's resolved daily quota,
    /// supplied by the caller like `check`'s limit.
    ///
    /// `ResourceExhausted` once the ceiling is crossed, carrying the
    /// seconds until the day bucket rolls over. Fails open like
    /// [`check`](Self::check) when the store is down.
    pub async fn note_quota_usage(
        &self,
        tenant_id: &str,
        metric: QuotaMetric,
        amount: u64,
        ceiling: u64,
    ) -> TesseraResult<u64> {
        let elapsed = self.epoch.elapsed().as_secs();
        let key = format!("quota:{tenant_id}:{}:{}", metric.as_str(), elapsed / DAY_SECS);
        let count = match self
            .counters
            .incr_with_ttl(&key, amount as i64, Duration::from_secs(DAY_SECS))
            .await
        {
            Ok(count) => count.max(0) as u64,
            Err(err) => {
                warn!(tenant_id, metric = metric.as_str(), error = %err,
                    "counter store down, quota accounting fails open");
                self.audit
                    .degraded(tenant_id, "quota_usage", "system", "counter store unavailable", false)
                    .await;
                return Ok(0);
            }
        };
        if count > ceiling {
            return Err(TesseraError::ResourceExhausted {
                resource: metric.as_str(),
                retry_after_secs: DAY_SECS - elapsed % DAY_SECS,
            });
        }
        Ok(count)
    }
}
