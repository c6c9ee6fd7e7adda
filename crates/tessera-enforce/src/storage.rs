//! Storage-key ownership guard.
//!
//! Object and vector store keys are namespaced `tenant-{id}/`. The
//! guard sits in front of backend access and checks a requested key
//! against the ambient tenant context; cross-tenant attempts are
//! rejected and audited as denials.

use tessera_control::audit::AuditTrail;
use tessera_core::context;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::repository::AuditSink;
use tracing::warn;

pub struct StorageGuard<A> {
    audit: AuditTrail<A>,
}

impl<A: AuditSink> StorageGuard<A> {
    pub fn new(audit: AuditTrail<A>) -> Self {
        Self { audit }
    }

    /// Authorize one storage key against the ambient tenant.
    ///
    /// A key outside the tenant's namespace fails with
    /// `PermissionDenied` and leaves a denied audit record charged to
    /// the requesting tenant. Calls outside a request scope fail with
    /// `NoTenantContext` unaudited, since there is no tenant to charge
    /// the record to.
    pub async fn authorize_key(&self, key: &str) -> TesseraResult<()> {
        match context::ensure_owned_key(key) {
            Ok(()) => Ok(()),
            Err(TesseraError::PermissionDenied { reason }) => {
                let tenant_id = context::current_tenant()?;
                warn!(tenant_id, key, "cross-tenant storage access rejected");
                self.audit
                    .denied(&tenant_id, "storage_access", &tenant_id, &reason)
                    .await;
                Err(TesseraError::PermissionDenied { reason })
            }
            Err(err) => Err(err),
        }
    }
}
