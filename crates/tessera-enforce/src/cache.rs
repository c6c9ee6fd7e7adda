//! Tenant-scoped cache facade.
//!
//! The facade never accepts a raw store key: every access is prefixed
//! with `cache:{tenant_id}:` derived from the ambient request context,
//! so cross-tenant reads are impossible by construction. Entry TTLs
//! default to the tenant's tier. Store failures are non-fatal — a
//! failed `get` is a miss and a failed `set` returns `false` — because
//! the cache is an accelerator, never a source of truth.

use std::sync::Arc;
use std::time::Duration;

use tessera_control::audit::AuditTrail;
use tessera_core::context;
use tessera_core::error::TesseraResult;
use tessera_core::models::audit::{AuditOutcome, AuditRecord};
use tessera_core::models::tenant::Tier;
use tessera_core::repository::{AuditSink, CacheStore, TenantStore};
use tracing::warn;

const BYTES_PER_GB: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Reject writes once the namespace exceeds the tenant's cache
    /// quota. Default is warn-and-continue.
    pub reject_over_quota: bool,
    /// Page size for namespace scans.
    pub scan_page: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            reject_over_quota: false,
            scan_page: 128,
        }
    }
}

pub struct TenantCache<C, S, A> {
    store: Arc<C>,
    tenants: Arc<S>,
    audit: AuditTrail<A>,
    config: CacheConfig,
}

impl<C: CacheStore, S: TenantStore, A: AuditSink> TenantCache<C, S, A> {
    pub fn new(store: Arc<C>, tenants: Arc<S>, audit: AuditTrail<A>, config: CacheConfig) -> Self {
        Self {
            store,
            tenants,
            audit,
            config,
        }
    }

    fn namespaced(tenant_id: &str, key: &str) -> String {
        format!("{}{key}", context::cache_prefix(tenant_id))
    }

    /// Fetch from the ambient tenant's namespace; store failures read
    /// as a miss.
    pub async fn get(&self, key: &str) -> TesseraResult<Option<Vec<u8>>> {
        let tenant_id = context::current_tenant()?;
        let full = Self::namespaced(&tenant_id, key);
        match self.store.get(&full).await {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(tenant_id, error = %err, "cache get failed, treating as miss");
                self.audit
                    .degraded(&tenant_id, "cache_get", &tenant_id, "cache store unavailable", false)
                    .await;
                Ok(None)
            }
        }
    }

    /// Write into the ambient tenant's namespace. `ttl = None` uses
    /// the tier default. Returns `false` when the write was dropped
    /// (store failure, or quota rejection when configured).
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> TesseraResult<bool> {
        let tenant_id = context::current_tenant()?;
        let (ttl, quota_bytes) = match self.tenants.get(&tenant_id).await {
            Ok(tenant) => (
                ttl.unwrap_or(Duration::from_secs(tenant.tier.cache_ttl_secs())),
                (tenant.quotas.cache_quota_gb * BYTES_PER_GB) as u64,
            ),
            Err(err) => {
                // Unknown tenant record: shortest TTL, no quota check.
                warn!(tenant_id, error = %err, "tenant lookup failed for cache write");
                (
                    ttl.unwrap_or(Duration::from_secs(Tier::Bronze.cache_ttl_secs())),
                    u64::MAX,
                )
            }
        };

        if quota_bytes < u64::MAX {
            let used = self.size_for(&tenant_id).await;
            if used + value.len() as u64 > quota_bytes {
                warn!(
                    tenant_id,
                    used_bytes = used,
                    quota_bytes,
                    "cache namespace over quota"
                );
                if self.config.reject_over_quota {
                    self.audit
                        .record(
                            AuditRecord::new(&tenant_id, "cache_set", &tenant_id, AuditOutcome::Denied)
                                .with_error_kind("resource_exhausted")
                                .with_after(serde_json::json!({
                                    "used_bytes": used,
                                    "quota_bytes": quota_bytes,
                                }))
                                .user_visible(),
                        )
                        .await;
                    return Ok(false);
                }
            }
        }

        let full = Self::namespaced(&tenant_id, key);
        match self.store.set(&full, value, Some(ttl)).await {
            Ok(()) => Ok(true),
            Err(err) => {
                warn!(tenant_id, error = %err, "cache set failed");
                self.audit
                    .degraded(&tenant_id, "cache_set", &tenant_id, "cache store unavailable", false)
                    .await;
                Ok(false)
            }
        }
    }

    /// Delete one key in the ambient tenant's namespace.
    pub async fn delete(&self, key: &str) -> TesseraResult<bool> {
        let tenant_id = context::current_tenant()?;
        let full = Self::namespaced(&tenant_id, key);
        match self.store.delete(&full).await {
            Ok(removed) => Ok(removed),
            Err(err) => {
                warn!(tenant_id, error = %err, "cache delete failed");
                Ok(false)
            }
        }
    }

    /// Invalidate the ambient tenant's whole namespace.
    pub async fn invalidate_tenant(&self) -> TesseraResult<usize> {
        let tenant_id = context::current_tenant()?;
        Ok(self.invalidate_for(&tenant_id).await)
    }

    /// Administrative namespace invalidation, used by the cascade
    /// adapters on suspend and delete. Cursored, so no global lock.
    pub async fn invalidate_for(&self, tenant_id: &str) -> usize {
        let prefix = context::cache_prefix(tenant_id);
        let mut cursor: Option<String> = None;
        let mut removed = 0;
        loop {
            let page = match self
                .store
                .scan(&prefix, cursor.as_deref(), self.config.scan_page)
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    warn!(tenant_id, error = %err, "cache scan failed during invalidation");
                    break;
                }
            };
            for key in &page.keys {
                if matches!(self.store.delete(key).await, Ok(true)) {
                    removed += 1;
                }
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        removed
    }

    /// Total bytes cached in the ambient tenant's namespace.
    pub async fn size(&self) -> TesseraResult<u64> {
        let tenant_id = context::current_tenant()?;
        Ok(self.size_for(&tenant_id).await)
    }

    /// Best-effort byte count of a tenant's namespace; unreadable
    /// entries count zero.
    pub async fn size_for(&self, tenant_id: &str) -> u64 {
        let prefix = context::cache_prefix(tenant_id);
        let mut cursor: Option<String> = None;
        let mut total = 0u64;
        loop {
            let page = match self
                .store
                .scan(&prefix, cursor.as_deref(), self.config.scan_page)
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    warn!(tenant_id, error = %err, "cache scan failed during size accounting");
                    break;
                }
            };
            for key in &page.keys {
                if let Ok(Some(value)) = self.store.get(key).await {
                    total += value.len() as u64;
                }
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        total
    }
}
