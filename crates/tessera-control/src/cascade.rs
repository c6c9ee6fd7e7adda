//! Cascading operator — ordered best-effort fan-out of lifecycle
//! actions to dependent subsystems.
//!
//! Not a two-phase commit: an adapter failure is audited and reported
//! but never aborts later adapters or rolls back the registry status.
//! A background reconciler is expected to drive stragglers to
//! convergence from the authoritative status.
//!
//! Adapters run in a fixed order for one tenant (sequential per
//! tenant); fan-outs for different tenants may run in parallel.

use std::sync::Arc;
use std::time::Duration;

use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::audit::{AuditOutcome, AuditRecord};
use tessera_core::models::certificate::DeletionReceipt;
use tessera_core::models::tenant::{Tenant, TenantStatus};
use tessera_core::repository::{AuditSink, SubsystemAdapter};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audit::AuditTrail;
use crate::lifecycle::{LifecycleEvent, LifecycleEvents};

/// Canonical fan-out order.
pub const ADAPTER_ORDER: [&str; 5] = [
    "relational-store",
    "vector-store",
    "object-store",
    "cache-store",
    "monitoring",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeAction {
    Suspend,
    Activate,
    Delete,
}

impl CascadeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CascadeAction::Suspend => "suspend",
            CascadeAction::Activate => "activate",
            CascadeAction::Delete => "delete",
        }
    }
}

/// Per-adapter result of one fan-out.
#[derive(Debug)]
pub struct AdapterOutcome {
    pub adapter: &'static str,
    /// `Some(receipt)` only for delete actions.
    pub result: TesseraResult<Option<DeletionReceipt>>,
}

#[derive(Debug)]
pub struct CascadeReport {
    pub tenant_id: String,
    pub operation: String,
    pub outcomes: Vec<AdapterOutcome>,
}

impl CascadeReport {
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn receipts(&self) -> Vec<&DeletionReceipt> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().and_then(Option::as_ref))
            .collect()
    }
}

/// Per-adapter verification result after a deletion.
#[derive(Debug, Clone)]
pub struct AdapterVerification {
    pub adapter: &'static str,
    pub verified: bool,
}

pub struct CascadeOperator<A> {
    adapters: Vec<Arc<dyn SubsystemAdapter>>,
    audit: AuditTrail<A>,
    timeout: Duration,
}

impl<A: AuditSink + 'static> CascadeOperator<A> {
    /// `adapters` must already be in the canonical order
    /// ([`ADAPTER_ORDER`] for the standard five subsystems).
    pub fn new(
        adapters: Vec<Arc<dyn SubsystemAdapter>>,
        audit: AuditTrail<A>,
        timeout: Duration,
    ) -> Self {
        Self {
            adapters,
            audit,
            timeout,
        }
    }

    /// Fan out provisioning for a newly created tenant.
    pub async fn provision(&self, tenant: &Tenant) -> CascadeReport {
        let mut outcomes = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let result = self
                .bounded(adapter.name(), adapter.on_provision(tenant))
                .await;
            self.audit_outcome(&tenant.tenant_id, "provision", adapter.name(), &result)
                .await;
            outcomes.push(AdapterOutcome {
                adapter: adapter.name(),
                result: result.map(|_| None),
            });
        }
        CascadeReport {
            tenant_id: tenant.tenant_id.clone(),
            operation: "cascade_provision".into(),
            outcomes,
        }
    }

    /// Fan out a lifecycle action to every adapter in order.
    pub async fn apply(&self, action: CascadeAction, tenant_id: &str) -> CascadeReport {
        let mut outcomes = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let result = match action {
                CascadeAction::Suspend => self
                    .bounded(adapter.name(), adapter.on_suspend(tenant_id))
                    .await
                    .map(|_| None),
                CascadeAction::Activate => self
                    .bounded(adapter.name(), adapter.on_activate(tenant_id))
                    .await
                    .map(|_| None),
                CascadeAction::Delete => self
                    .bounded(adapter.name(), adapter.on_delete(tenant_id))
                    .await
                    .map(Some),
            };
            self.audit_outcome(tenant_id, action.as_str(), adapter.name(), &result)
                .await;
            outcomes.push(AdapterOutcome {
                adapter: adapter.name(),
                result,
            });
        }
        CascadeReport {
            tenant_id: tenant_id.to_string(),
            operation: format!("cascade_{}", action.as_str()),
            outcomes,
        }
    }

    /// Ask every adapter whether the tenant's data is gone. Adapter
    /// failures count as unverified.
    pub async fn verify_deleted(&self, tenant_id: &str) -> Vec<AdapterVerification> {
        let mut verifications = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let verified = self
                .bounded(adapter.name(), adapter.verify_deleted(tenant_id))
                .await
                .unwrap_or(false);
            verifications.push(AdapterVerification {
                adapter: adapter.name(),
                verified,
            });
        }
        verifications
    }

    /// Subscribe to lifecycle events and fan out in the background
    /// until cancelled. Adapters never call back into the registry.
    pub fn spawn_subscriber(
        self: Arc<Self>,
        events: &LifecycleEvents,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(LifecycleEvent::Created { tenant }) => {
                            self.provision(&tenant).await;
                        }
                        Ok(LifecycleEvent::Transitioned { tenant_id, to, .. }) => {
                            let action = match to {
                                TenantStatus::Suspended => Some(CascadeAction::Suspend),
                                TenantStatus::Active => Some(CascadeAction::Activate),
                                TenantStatus::Deleted => Some(CascadeAction::Delete),
                                _ => None,
                            };
                            if let Some(action) = action {
                                self.apply(action, &tenant_id).await;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "cascade subscriber lagged; reconciler will catch up");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            info!("cascade subscriber stopped");
        })
    }

    /// Bound an adapter call by the configured timeout; an elapsed
    /// timer is a neutral `Unavailable`, never a hung caller.
    async fn bounded<T>(
        &self,
        adapter: &'static str,
        fut: impl Future<Output = TesseraResult<T>>,
    ) -> TesseraResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(TesseraError::Unavailable {
                reason: format!("{adapter} adapter timed out"),
            }),
        }
    }

    async fn audit_outcome<T>(
        &self,
        tenant_id: &str,
        action: &str,
        adapter: &'static str,
        result: &TesseraResult<T>,
    ) {
        let record = match result {
            Ok(_) => AuditRecord::new(
                tenant_id,
                format!("cascade_{action}"),
                "cascade-operator",
                AuditOutcome::Success,
            ),
            Err(err) => {
                warn!(
                    tenant_id = %tenant_id,
                    adapter = %adapter,
                    action = %action,
                    error = %err,
                    "cascade adapter failed; continuing"
                );
                AuditRecord::new(
                    tenant_id,
                    format!("cascade_{action}"),
                    "cascade-operator",
                    AuditOutcome::Failure,
                )
                .with_error_kind(err.kind())
            }
        };
        self.audit
            .record(record.with_after(serde_json::json!({ "adapter": adapter })))
            .await;
    }
}
