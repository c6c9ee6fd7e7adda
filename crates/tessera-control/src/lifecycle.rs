//! Lifecycle manager — serialized status transitions and event
//! fan-out.
//!
//! The status change in the registry store is the source of truth;
//! dependent subsystems observe [`LifecycleEvent`]s and reconcile
//! against it. Cascade failures never roll a transition back.

use std::sync::Arc;

use chrono::Utc;
use tessera_core::error::TesseraResult;
use tessera_core::lifecycle::{check_transition, valid_transitions};
use tessera_core::models::audit::{AuditOutcome, AuditRecord};
use tessera_core::models::tenant::{Tenant, TenantStatus};
use tessera_core::repository::{AuditSink, TenantStore};
use tokio::sync::broadcast;
use tracing::info;

use crate::audit::AuditTrail;
use crate::locks::TenantLocks;

/// Published on every registry-visible lifecycle change. Subscribers
/// (the cascading operator, reconcilers) never call back into the
/// registry.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Created {
        tenant: Tenant,
    },
    Transitioned {
        tenant_id: String,
        from: TenantStatus,
        to: TenantStatus,
        reason: String,
    },
}

/// Broadcast channel for lifecycle events. Cloneable handle; slow
/// subscribers drop the oldest events (broadcast semantics).
#[derive(Clone)]
pub struct LifecycleEvents {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleEvents {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: LifecycleEvent) {
        // No receivers is fine; the registry works stand-alone.
        let _ = self.tx.send(event);
    }
}

pub struct LifecycleManager<S, A> {
    tenants: Arc<S>,
    audit: AuditTrail<A>,
    events: LifecycleEvents,
    locks: Arc<TenantLocks>,
}

impl<S: TenantStore, A: AuditSink> LifecycleManager<S, A> {
    pub fn new(
        tenants: Arc<S>,
        audit: AuditTrail<A>,
        events: LifecycleEvents,
        locks: Arc<TenantLocks>,
    ) -> Self {
        Self {
            tenants,
            audit,
            events,
            locks,
        }
    }

    /// Drive a tenant to `new_status`. Transitions for one tenant are
    /// serialized by the per-tenant writer lock; observers see them in
    /// emission order.
    pub async fn transition(
        &self,
        tenant_id: &str,
        new_status: TenantStatus,
        reason: &str,
        actor: &str,
    ) -> TesseraResult<Tenant> {
        let _guard = self.locks.acquire(tenant_id).await;

        let mut tenant = self.tenants.get(tenant_id).await?;
        let from = tenant.status;

        if let Err(err) = check_transition(from, new_status) {
            self.audit
                .record(
                    AuditRecord::new(tenant_id, "lifecycle_transition", actor, AuditOutcome::Failure)
                        .with_before(serde_json::json!({ "status": from.as_str() }))
                        .with_after(serde_json::json!({
                            "status": new_status.as_str(),
                            "reason": reason,
                        }))
                        .with_error_kind(err.kind()),
                )
                .await;
            return Err(err);
        }

        tenant.status = new_status;
        tenant.updated_at = Utc::now();
        if new_status == TenantStatus::Deleted {
            // Monotonic: only ever set, never cleared.
            tenant.deleted_at.get_or_insert_with(Utc::now);
        }
        self.tenants.update(tenant.clone()).await?;

        info!(
            tenant_id = %tenant_id,
            from = %from,
            to = %new_status,
            reason = %reason,
            "lifecycle transition"
        );
        self.audit
            .record(
                AuditRecord::new(tenant_id, "lifecycle_transition", actor, AuditOutcome::Success)
                    .with_before(serde_json::json!({ "status": from.as_str() }))
                    .with_after(serde_json::json!({
                        "status": new_status.as_str(),
                        "reason": reason,
                    })),
            )
            .await;
        self.events.publish(LifecycleEvent::Transitioned {
            tenant_id: tenant_id.to_string(),
            from,
            to: new_status,
            reason: reason.to_string(),
        });

        Ok(tenant)
    }

    pub async fn suspend(&self, tenant_id: &str, reason: &str, actor: &str) -> TesseraResult<Tenant> {
        self.transition(tenant_id, TenantStatus::Suspended, reason, actor)
            .await
    }

    pub async fn activate(&self, tenant_id: &str, reason: &str, actor: &str) -> TesseraResult<Tenant> {
        self.transition(tenant_id, TenantStatus::Active, reason, actor)
            .await
    }

    /// Statuses currently reachable for a tenant.
    pub async fn get_valid_transitions(&self, tenant_id: &str) -> TesseraResult<Vec<TenantStatus>> {
        let tenant = self.tenants.get(tenant_id).await?;
        Ok(valid_transitions(tenant.status).to_vec())
    }
}
