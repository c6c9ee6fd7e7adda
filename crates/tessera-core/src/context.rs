//! Ambient tenant context.
//!
//! A task-local mapping from the current task to a tenant identity and
//! a cancellation token. The context is set at the transport boundary
//! (after authentication) via [`scope`] and released on every exit
//! path when the scoped future completes. Descendant tasks spawned
//! through [`spawn_scoped`] inherit both the identity and the token,
//! so cancelling at the request boundary cancels the whole tree.
//!
//! Every data-plane call that touches tenant-scoped storage must go
//! through [`current_tenant`] or [`ensure_owned_key`]; a missing
//! context fails with `NoTenantContext` rather than defaulting to any
//! tenant.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{TesseraError, TesseraResult};

tokio::task_local! {
    static CURRENT: RequestContext;
}

/// Identity and cancellation carried by every request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    tenant_id: Arc<str>,
    cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Arc::from(tenant_id.into()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_token(tenant_id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            tenant_id: Arc::from(tenant_id.into()),
            cancel,
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel this request and every descendant task spawned from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Run `fut` with `ctx` as the ambient context. The context is
/// released when the future completes, is cancelled, or panics.
pub async fn scope<F>(ctx: RequestContext, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(ctx, fut).await
}

/// The ambient context of the current task.
pub fn current() -> TesseraResult<RequestContext> {
    CURRENT
        .try_with(Clone::clone)
        .map_err(|_| TesseraError::NoTenantContext)
}

/// The tenant id of the current task.
pub fn current_tenant() -> TesseraResult<String> {
    CURRENT
        .try_with(|ctx| ctx.tenant_id.to_string())
        .map_err(|_| TesseraError::NoTenantContext)
}

/// Spawn a task inheriting the current context (identity and
/// cancellation token). Fails with `NoTenantContext` when called
/// outside a request scope.
pub fn spawn_scoped<F>(fut: F) -> TesseraResult<JoinHandle<F::Output>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let ctx = current()?;
    Ok(tokio::spawn(CURRENT.scope(ctx, fut)))
}

/// Canonical storage prefix for a tenant. Every tenant-scoped key in
/// the object and vector stores lives under this prefix.
pub fn storage_prefix(tenant_id: &str) -> String {
    format!("tenant-{tenant_id}/")
}

/// Canonical cache namespace prefix for a tenant.
pub fn cache_prefix(tenant_id: &str) -> String {
    format!("cache:{tenant_id}:")
}

/// Fail with `PermissionDenied` unless `key` lies inside the ambient
/// tenant's storage namespace. Callers audit the denial.
pub fn ensure_owned_key(key: &str) -> TesseraResult<()> {
    let tenant = current_tenant()?;
    let prefix = storage_prefix(&tenant);
    if key.starts_with(&prefix) {
        Ok(())
    } else {
        Err(TesseraError::PermissionDenied {
            reason: format!("key {key:?} is outside tenant {tenant:?} namespace"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn context_set_and_cleared() {
        assert!(matches!(
            current_tenant(),
            Err(TesseraError::NoTenantContext)
        ));

        let inside = scope(RequestContext::new("finance"), async {
            current_tenant().unwrap()
        })
        .await;
        assert_eq!(inside, "finance");

        // Cleared after the scope ends.
        assert!(matches!(
            current_tenant(),
            Err(TesseraError::NoTenantContext)
        ));
    }

    #[tokio::test]
    async fn context_inherited_by_spawned_tasks() {
        let seen = scope(RequestContext::new("finance"), async {
            let handle = spawn_scoped(async { current_tenant().unwrap() }).unwrap();
            handle.await.unwrap()
        })
        .await;
        assert_eq!(seen, "finance");
    }

    #[tokio::test]
    async fn cancellation_reaches_descendants() {
        let ctx = RequestContext::new("finance");
        let token = ctx.cancellation().clone();

        let handle = scope(ctx, async {
            spawn_scoped(async {
                let ctx = current().unwrap();
                ctx.cancellation().cancelled().await;
                "cancelled"
            })
            .unwrap()
        })
        .await;

        token.cancel();
        assert_eq!(handle.await.unwrap(), "cancelled");
    }

    #[tokio::test]
    async fn cross_tenant_key_denied() {
        scope(RequestContext::new("legal"), async {
            assert!(ensure_owned_key("tenant-legal/docs/brief.pdf").is_ok());
            let err = ensure_owned_key("finance/ledger.csv").unwrap_err();
            assert!(matches!(err, TesseraError::PermissionDenied { .. }));
            let err = ensure_owned_key("tenant-finance/ledger.csv").unwrap_err();
            assert!(matches!(err, TesseraError::PermissionDenied { .. }));
        })
        .await;
    }

    #[tokio::test]
    async fn owned_key_requires_context() {
        assert!(matches!(
            ensure_owned_key("tenant-finance/x"),
            Err(TesseraError::NoTenantContext)
        ));
    }
}
