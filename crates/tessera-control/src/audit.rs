//! Audit trail service.
//!
//! Thin layer over an [`AuditSink`] with helpers for the record shapes
//! the control plane emits. A failing sink never fails the audited
//! operation; the miss is logged instead.

use std::sync::Arc;

use tessera_core::error::TesseraError;
use tessera_core::models::audit::{AuditOutcome, AuditRecord};
use tessera_core::repository::AuditSink;
use tracing::warn;

pub struct AuditTrail<A> {
    sink: Arc<A>,
}

impl<A> Clone for AuditTrail<A> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<A: AuditSink> AuditTrail<A> {
    pub fn new(sink: Arc<A>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<A> {
        &self.sink
    }

    pub async fn record(&self, record: AuditRecord) {
        if let Err(err) = self.sink.append(record).await {
            warn!(error = %err, "audit record dropped");
        }
    }

    pub async fn success(&self, tenant_id: &str, operation: &str, actor: &str) {
        self.record(AuditRecord::new(
            tenant_id,
            operation,
            actor,
            AuditOutcome::Success,
        ))
        .await;
    }

    pub async fn failure(&self, tenant_id: &str, operation: &str, actor: &str, err: &TesseraError) {
        self.record(
            AuditRecord::new(tenant_id, operation, actor, AuditOutcome::Failure)
                .with_error_kind(err.kind())
                .user_visible(),
        )
        .await;
    }

    /// A cross-tenant access attempt or other policy denial.
    pub async fn denied(&self, tenant_id: &str, operation: &str, actor: &str, reason: &str) {
        self.record(
            AuditRecord::new(tenant_id, operation, actor, AuditOutcome::Denied)
                .with_error_kind("permission_denied")
                .with_after(serde_json::json!({ "reason": reason }))
                .user_visible(),
        )
        .await;
    }

    /// The operation proceeded despite a store failure (fail-open
    /// paths). `user_visible` records whether behavior changed for the
    /// caller.
    pub async fn degraded(
        &self,
        tenant_id: &str,
        operation: &str,
        actor: &str,
        reason: &str,
        user_visible: bool,
    ) {
        let mut record = AuditRecord::new(tenant_id, operation, actor, AuditOutcome::Degraded)
            .with_error_kind("unavailable")
            .with_after(serde_json::json!({ "reason": reason }));
        if user_visible {
            record = record.user_visible();
        }
        self.record(record).await;
    }
}
