//! Hierarchical feature-flag evaluation.
//!
//! Precedence: tenant override, then tier default, then global
//! default, then `false`. Resolved values are cached per
//! `(tenant_id, feature_name)` with a short TTL; refreshes are
//! single-flight per key so a hot flag cannot stampede the store.
//! When one scope's storage is unavailable, evaluation falls through
//! to the next level.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tessera_core::error::TesseraResult;
use tessera_core::models::flag::{FeatureFlag, FlagScope};
use tessera_core::models::tenant::validate_tenant_id;
use tessera_core::repository::{FlagStore, TenantStore};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Clone, Copy)]
struct CachedValue {
    enabled: bool,
    fetched_at: Instant,
}

pub struct FlagService<F, S> {
    flags: Arc<F>,
    tenants: Arc<S>,
    ttl: Duration,
    cache: DashMap<(String, String), CachedValue>,
    inflight: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl<F: FlagStore, S: TenantStore> FlagService<F, S> {
    pub fn new(flags: Arc<F>, tenants: Arc<S>, cache_ttl: Duration) -> Self {
        Self {
            flags,
            tenants,
            ttl: cache_ttl,
            cache: DashMap::new(),
            inflight: DashMap::new(),
        }
    }

    /// Resolve a flag for a tenant. Never fails: storage errors fall
    /// through the hierarchy and the final default is `false`.
    pub async fn evaluate(&self, tenant_id: &str, feature_name: &str) -> bool {
        let key = (tenant_id.to_string(), feature_name.to_string());
        if let Some(hit) = self.fresh(&key) {
            return hit;
        }

        // Single-flight: one resolver per key, late arrivals reuse the
        // refreshed cache entry.
        let gate = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = gate.lock().await;
        if let Some(hit) = self.fresh(&key) {
            return hit;
        }

        let enabled = self.resolve(tenant_id, feature_name).await;
        self.cache.insert(
            key.clone(),
            CachedValue {
                enabled,
                fetched_at: Instant::now(),
            },
        );
        drop(_guard);
        self.inflight.remove(&key);
        enabled
    }

    /// Create or replace a flag setting. Invalidates every cached
    /// entry for the feature name across tenants.
    pub async fn set_flag(&self, flag: FeatureFlag) -> TesseraResult<()> {
        flag.validate()?;
        if flag.scope == FlagScope::Tenant
            && let Some(id) = &flag.scope_id
        {
            validate_tenant_id(id)?;
        }

        let feature_name = flag.feature_name.clone();
        self.flags.upsert(flag).await?;
        self.cache.retain(|(_, cached_feature), _| *cached_feature != feature_name);
        debug!(feature = %feature_name, "flag set, cache invalidated");
        Ok(())
    }

    pub async fn list_flags(
        &self,
        scope: Option<FlagScope>,
        scope_id: Option<&str>,
    ) -> TesseraResult<Vec<FeatureFlag>> {
        self.flags.list(scope, scope_id).await
    }

    fn fresh(&self, key: &(String, String)) -> Option<bool> {
        let cached = self.cache.get(key)?;
        (cached.fetched_at.elapsed() < self.ttl).then_some(cached.enabled)
    }

    async fn resolve(&self, tenant_id: &str, feature_name: &str) -> bool {
        // Tenant override.
        if let Ok(Some(flag)) = self
            .flags
            .get(feature_name, FlagScope::Tenant, Some(tenant_id))
            .await
        {
            return flag.enabled;
        }

        // Tier default, when the tenant is known.
        if let Ok(tenant) = self.tenants.get(tenant_id).await
            && tenant.deleted_at.is_none()
            && let Ok(Some(flag)) = self
                .flags
                .get(feature_name, FlagScope::Tier, Some(tenant.tier.as_str()))
                .await
        {
            return flag.enabled;
        }

        // Global default.
        if let Ok(Some(flag)) = self.flags.get(feature_name, FlagScope::Global, None).await {
            return flag.enabled;
        }

        false
    }
}
