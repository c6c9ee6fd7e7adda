//! Tier-aware autoscaling policy.
//!
//! Replica targets derive from queue depth: `ceil(depth / target_per_replica)`
//! clamped to the tier's `[min, max]`, falling back to `min` on an
//! empty queue. A cluster-wide validator rejects any decision that
//! would hand one tenant more than its tier's share of total capacity,
//! so a single platinum tenant cannot starve the pool. Every decision
//! is audited with before/after counts, the reason, and remaining
//! cooldown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tessera_control::audit::AuditTrail;
use tessera_core::models::audit::{AuditOutcome, AuditRecord};
use tessera_core::models::tenant::{Tenant, TenantFilter, TenantStatus, Tier};
use tessera_core::repository::{AuditSink, TenantStore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::queue::TenantQueueManager;

#[derive(Debug, Clone, Copy)]
pub struct TierScalePolicy {
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// Queue items one replica is expected to absorb.
    pub target_per_replica: u32,
    pub scale_up_cooldown: Duration,
    pub scale_down_cooldown: Duration,
    /// Maximum share of cluster capacity one tenant may hold, percent.
    pub quota_pct: f64,
    pub sla_target: f64,
}

impl TierScalePolicy {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Platinum => Self {
                min_replicas: 4,
                max_replicas: 64,
                target_per_replica: 10,
                scale_up_cooldown: Duration::from_secs(60),
                scale_down_cooldown: Duration::from_secs(300),
                quota_pct: 40.0,
                sla_target: 0.999,
            },
            Tier::Gold => Self {
                min_replicas: 2,
                max_replicas: 32,
                target_per_replica: 10,
                scale_up_cooldown: Duration::from_secs(60),
                scale_down_cooldown: Duration::from_secs(300),
                quota_pct: 30.0,
                sla_target: 0.995,
            },
            Tier::Silver => Self {
                min_replicas: 1,
                max_replicas: 16,
                target_per_replica: 10,
                scale_up_cooldown: Duration::from_secs(120),
                scale_down_cooldown: Duration::from_secs(600),
                quota_pct: 20.0,
                sla_target: 0.99,
            },
            Tier::Bronze => Self {
                min_replicas: 1,
                max_replicas: 8,
                target_per_replica: 10,
                scale_up_cooldown: Duration::from_secs(120),
                scale_down_cooldown: Duration::from_secs(600),
                quota_pct: 10.0,
                sla_target: 0.95,
            },
        }
    }

    /// Replica target for a queue depth.
    pub fn target_for(&self, depth: usize) -> u32 {
        if depth == 0 {
            return self.min_replicas;
        }
        let raw = (depth as u32).div_ceil(self.target_per_replica.max(1));
        raw.clamp(self.min_replicas, self.max_replicas)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScaleDecision {
    pub tenant_id: String,
    pub current: u32,
    pub proposed: u32,
    pub approved: bool,
    pub reason: String,
    pub cooldown_remaining_secs: u64,
}

#[derive(Debug, Clone, Copy)]
struct ReplicaState {
    replicas: u32,
    last_scale_up: Option<Instant>,
    last_scale_down: Option<Instant>,
}

pub struct AutoscalePolicy<A> {
    policies: HashMap<Tier, TierScalePolicy>,
    replicas: DashMap<String, ReplicaState>,
    cluster_capacity: u32,
    audit: AuditTrail<A>,
}

impl<A: AuditSink> AutoscalePolicy<A> {
    pub fn new(cluster_capacity: u32, audit: AuditTrail<A>) -> Self {
        Self {
            policies: Tier::ALL
                .into_iter()
                .map(|tier| (tier, TierScalePolicy::for_tier(tier)))
                .collect(),
            replicas: DashMap::new(),
            cluster_capacity,
            audit,
        }
    }

    /// Override the policy for one tier. Call before sharing the
    /// service.
    pub fn set_policy(&mut self, tier: Tier, policy: TierScalePolicy) {
        self.policies.insert(tier, policy);
    }

    pub fn policy(&self, tier: Tier) -> TierScalePolicy {
        self.policies
            .get(&tier)
            .copied()
            .unwrap_or_else(|| TierScalePolicy::for_tier(tier))
    }

    /// Current replica count for a tenant, defaulting to the tier
    /// minimum before the first decision.
    pub fn replicas(&self, tenant: &Tenant) -> u32 {
        self.replicas
            .get(&tenant.tenant_id)
            .map(|s| s.replicas)
            .unwrap_or(self.policy(tenant.tier).min_replicas)
    }

    /// Evaluate one tenant against its queue depth, applying the
    /// decision when approved.
    pub async fn evaluate(&self, tenant: &Tenant, queue_depth: usize) -> ScaleDecision {
        let policy = self.policy(tenant.tier);
        let now = Instant::now();
        let mut state = self
            .replicas
            .entry(tenant.tenant_id.clone())
            .or_insert(ReplicaState {
                replicas: policy.min_replicas,
                last_scale_up: None,
                last_scale_down: None,
            });
        let current = state.replicas;
        let proposed = policy.target_for(queue_depth);

        let share = proposed as f64 * 100.0 / self.cluster_capacity.max(1) as f64;
        let decision = if share > policy.quota_pct {
            ScaleDecision {
                tenant_id: tenant.tenant_id.clone(),
                current,
                proposed,
                approved: false,
                reason: format!("quota exceeded: {share:.0}% > {:.0}%", policy.quota_pct),
                cooldown_remaining_secs: 0,
            }
        } else {
            let cooldown_remaining = if proposed > current {
                remaining_cooldown(state.last_scale_up, policy.scale_up_cooldown, now)
            } else if proposed < current {
                remaining_cooldown(state.last_scale_down, policy.scale_down_cooldown, now)
            } else {
                0
            };
            if cooldown_remaining > 0 {
                ScaleDecision {
                    tenant_id: tenant.tenant_id.clone(),
                    current,
                    proposed,
                    approved: false,
                    reason: "cooldown active".into(),
                    cooldown_remaining_secs: cooldown_remaining,
                }
            } else {
                if proposed > current {
                    state.last_scale_up = Some(now);
                    state.replicas = proposed;
                } else if proposed < current {
                    state.last_scale_down = Some(now);
                    state.replicas = proposed;
                }
                ScaleDecision {
                    tenant_id: tenant.tenant_id.clone(),
                    current,
                    proposed,
                    approved: true,
                    reason: format!("queue depth {queue_depth}"),
                    cooldown_remaining_secs: 0,
                }
            }
        };
        drop(state);

        debug!(
            tenant_id = %decision.tenant_id,
            current = decision.current,
            proposed = decision.proposed,
            approved = decision.approved,
            reason = %decision.reason,
            "scale decision"
        );
        let outcome = if decision.approved {
            AuditOutcome::Success
        } else {
            AuditOutcome::Denied
        };
        self.audit
            .record(
                AuditRecord::new(&tenant.tenant_id, "scale_event", "system", outcome)
                    .with_before(serde_json::json!({ "replicas": decision.current }))
                    .with_after(serde_json::json!({
                        "replicas": decision.proposed,
                        "reason": decision.reason,
                        "cooldown_remaining_secs": decision.cooldown_remaining_secs,
                    })),
            )
            .await;
        decision
    }

    /// Background loop evaluating every active tenant against its
    /// queue depth.
    pub fn spawn<S, T>(
        self: Arc<Self>,
        tenants: Arc<S>,
        queues: Arc<TenantQueueManager<T, A>>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()>
    where
        S: TenantStore + 'static,
        T: Send + 'static,
        A: AuditSink + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
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
                        warn!(error = %err, "autoscale scan skipped, tenant listing failed");
                        continue;
                    }
                };
                for tenant in active {
                    let depth = queues.depth(&tenant.tenant_id);
                    self.evaluate(&tenant, depth).await;
                }
            }
        })
    }
}

fn remaining_cooldown(last: Option<Instant>, cooldown: Duration, now: Instant) -> u64 {
    match last {
        Some(at) if now < at + cooldown => ((at + cooldown) - now).as_secs().max(1),
        _ => 0,
    }
}
