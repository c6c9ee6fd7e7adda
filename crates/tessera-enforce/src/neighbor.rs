//! Noisy-neighbor detection and mitigation.
//!
//! The controller periodically compares each active tenant's observed
//! request rate against its baseline — the rolling median of the
//! previous seven well-behaved periods, or the tier default rate while
//! no history exists. A 3x..5x excess halves the effective rate limit
//! for five minutes; 5x and above circuit-breaks the tenant for the
//! same window. Expiry restores the original limit automatically and
//! the tenant's lifecycle status is never touched.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tessera_control::audit::AuditTrail;
use tessera_core::models::audit::{AuditOutcome, AuditRecord};
use tessera_core::models::tenant::{TenantFilter, TenantStatus};
use tessera_core::repository::{AuditSink, CounterStore, TenantStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::rate::{Mitigation, RateEnforcer, ThrottleState};

#[derive(Debug, Clone, Copy)]
pub struct NeighborConfig {
    /// Ratio at which the effective limit is reduced.
    pub high_ratio: f64,
    /// Ratio at which the tenant is circuit-broken.
    pub critical_ratio: f64,
    pub reduce_divisor: u32,
    pub mitigation_window: Duration,
    /// Periods retained for the rolling-median baseline.
    pub history_periods: usize,
    pub scan_interval: Duration,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self {
            high_ratio: 3.0,
            critical_ratio: 5.0,
            reduce_divisor: 2,
            mitigation_window: Duration::from_secs(300),
            history_periods: 7,
            scan_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

pub struct NoisyNeighborController<A> {
    throttle: Arc<ThrottleState>,
    audit: AuditTrail<A>,
    history: DashMap<String, VecDeque<u64>>,
    config: NeighborConfig,
}

impl<A: AuditSink> NoisyNeighborController<A> {
    pub fn new(throttle: Arc<ThrottleState>, audit: AuditTrail<A>, config: NeighborConfig) -> Self {
        Self {
            throttle,
            audit,
            history: DashMap::new(),
            config,
        }
    }

    /// Rolling-median baseline for a tenant, or `tier_default` while
    /// no history has accumulated.
    pub fn baseline(&self, tenant_id: &str, tier_default: u64) -> u64 {
        match self.history.get(tenant_id) {
            Some(periods) if !periods.is_empty() => {
                let mut sorted: Vec<u64> = periods.iter().copied().collect();
                sorted.sort_unstable();
                sorted[sorted.len() / 2]
            }
            _ => tier_default,
        }
    }

    /// Classify one period's observation and apply the mitigation the
    /// severity calls for.
    ///
    /// Only well-behaved periods feed the baseline, so a sustained
    /// burst cannot ratchet its own baseline upward.
    pub async fn observe_period(
        &self,
        tenant_id: &str,
        observed_qpm: u64,
        tier_default: u64,
    ) -> Severity {
        let baseline = self.baseline(tenant_id, tier_default).max(1);
        let ratio = observed_qpm as f64 / baseline as f64;
        let severity = if ratio >= self.config.critical_ratio {
            Severity::Critical
        } else if ratio >= self.config.high_ratio {
            Severity::High
        } else {
            Severity::Normal
        };

        match severity {
            Severity::Critical => {
                self.mitigate(tenant_id, Mitigation::CircuitBreak, observed_qpm, baseline)
                    .await;
            }
            Severity::High => {
                self.mitigate(
                    tenant_id,
                    Mitigation::ReduceRate {
                        divisor: self.config.reduce_divisor,
                    },
                    observed_qpm,
                    baseline,
                )
                .await;
            }
            Severity::Normal => {
                let mut periods = self.history.entry(tenant_id.to_string()).or_default();
                if periods.len() == self.config.history_periods {
                    periods.pop_front();
                }
                periods.push_back(observed_qpm);
            }
        }
        severity
    }

    async fn mitigate(&self, tenant_id: &str, mitigation: Mitigation, observed: u64, baseline: u64) {
        self.throttle
            .impose(tenant_id, mitigation, self.config.mitigation_window);
        warn!(
            tenant_id,
            observed_qpm = observed,
            baseline_qpm = baseline,
            action = mitigation.as_str(),
            "noisy-neighbor mitigation imposed"
        );
        self.audit
            .record(
                AuditRecord::new(tenant_id, "noisy_neighbor_mitigation", "system", AuditOutcome::Success)
                    .with_after(serde_json::json!({
                        "action": mitigation.as_str(),
                        "observed_qpm": observed,
                        "baseline_qpm": baseline,
                        "window_secs": self.config.mitigation_window.as_secs(),
                    }))
                    .user_visible(),
            )
            .await;
    }

    /// Circuit-break immediately, bypassing classification. Used by
    /// the blast-radius detector on P0 incidents.
    pub async fn apply_critical(&self, tenant_id: &str, reason: &str) {
        self.throttle
            .impose(tenant_id, Mitigation::CircuitBreak, self.config.mitigation_window);
        warn!(tenant_id, reason, "critical mitigation imposed");
        self.audit
            .record(
                AuditRecord::new(tenant_id, "noisy_neighbor_mitigation", "system", AuditOutcome::Success)
                    .with_after(serde_json::json!({
                        "action": Mitigation::CircuitBreak.as_str(),
                        "reason": reason,
                        "window_secs": self.config.mitigation_window.as_secs(),
                    }))
                    .user_visible(),
            )
            .await;
    }

    /// Lift any active mitigation, e.g. when a suspended tenant is
    /// reactivated.
    pub fn restore(&self, tenant_id: &str) -> bool {
        self.throttle.clear(tenant_id)
    }

    /// Background scan loop: one period per tick, observing each
    /// active tenant's current request rate.
    pub fn spawn<C, S>(
        self: Arc<Self>,
        rates: Arc<RateEnforcer<C, A>>,
        tenants: Arc<S>,
        cancel: CancellationToken,
    ) -> JoinHandle<()>
    where
        C: CounterStore + 'static,
        S: TenantStore + 'static,
        A: AuditSink + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.scan_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let filter = TenantFilter {
                    status: Some(TenantStatus::Active),
                    ..Default::default()
                };
                let active = match tenants.list(&filter).await {
                    Ok(active) => active,
                    Err(err) => {
                        warn!(error = %err, "noisy-neighbor scan skipped, tenant listing failed");
                        continue;
                    }
                };
                for tenant in active {
                    let observed = match rates.observed_qpm(&tenant.tenant_id).await {
                        Ok(observed) => observed,
                        Err(err) => {
                            warn!(tenant_id = %tenant.tenant_id, error = %err,
                                "rate observation unavailable");
                            continue;
                        }
                    };
                    self.observe_period(
                        &tenant.tenant_id,
                        observed,
                        tenant.quotas.rate_qpm as u64,
                    )
                    .await;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_median_of_history() {
        let controller: NoisyNeighborController<tessera_memstore::MemoryAuditSink> =
            NoisyNeighborController::new(
                Arc::new(ThrottleState::new()),
                AuditTrail::new(Arc::new(tessera_memstore::MemoryAuditSink::new())),
                NeighborConfig::default(),
            );
        assert_eq!(controller.baseline("finance", 300), 300);

        controller
            .history
            .insert("finance".into(), VecDeque::from([80, 120, 100]));
        assert_eq!(controller.baseline("finance", 300), 100);
    }
}
