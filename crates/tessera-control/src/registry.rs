//! Tenant registry — authoritative tenant records.
//!
//! Create/read/update/purge over a [`TenantStore`], with tier-default
//! quotas, soft-delete visibility, the residency freeze, and derived
//! health recording. Status changes are not accepted here; they go
//! through the lifecycle manager.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::health::{HealthSignals, health_score};
use tessera_core::models::audit::{AuditOutcome, AuditRecord};
use tessera_core::models::tenant::{
    CreateTenant, IsolationModel, Tenant, TenantFilter, TenantStatus, UpdateTenant,
    validate_tenant_id,
};
use tessera_core::models::usage::BillingPeriod;
use tessera_core::repository::{AuditSink, TenantStore, UsageStore};
use tracing::info;

use crate::audit::AuditTrail;
use crate::lifecycle::{LifecycleEvent, LifecycleEvents};
use crate::locks::TenantLocks;

/// Registry-wide counts, grouped by status and tier.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_tier: BTreeMap<String, usize>,
}

pub struct TenantRegistry<S, U, A> {
    tenants: Arc<S>,
    usage: Arc<U>,
    audit: AuditTrail<A>,
    events: LifecycleEvents,
    locks: Arc<TenantLocks>,
}

impl<S, U, A> TenantRegistry<S, U, A>
where
    S: TenantStore,
    U: UsageStore,
    A: AuditSink,
{
    pub fn new(
        tenants: Arc<S>,
        usage: Arc<U>,
        audit: AuditTrail<A>,
        events: LifecycleEvents,
        locks: Arc<TenantLocks>,
    ) -> Self {
        Self {
            tenants,
            usage,
            audit,
            events,
            locks,
        }
    }

    /// Register a new tenant. Unset quotas default from the tier;
    /// overrides must satisfy tier minima. Emits a `created` audit
    /// record and a provisioning lifecycle event.
    pub async fn create(&self, input: CreateTenant, actor: &str) -> TesseraResult<Tenant> {
        validate_tenant_id(&input.tenant_id)?;

        let mut quotas = input.tier.default_quotas();
        if let Some(overrides) = &input.quotas {
            quotas = quotas.with_overrides(overrides);
            quotas.validate_for_tier(input.tier)?;
        }

        let now = Utc::now();
        let tenant = Tenant {
            tenant_id: input.tenant_id,
            display_name: input.display_name,
            admin_contact: input.admin_contact,
            tier: input.tier,
            status: TenantStatus::Active,
            isolation: input.isolation.unwrap_or(IsolationModel::SharedSchema),
            residency_region: input.residency_region,
            kms_key_id: input.kms_key_id,
            legal_hold: false,
            quotas,
            health_score: 100,
            metadata: input.metadata.unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        self.tenants.insert(tenant.clone()).await?;

        info!(tenant_id = %tenant.tenant_id, tier = %tenant.tier, "tenant created");
        self.audit
            .record(
                AuditRecord::new(&tenant.tenant_id, "tenant_create", actor, AuditOutcome::Success)
                    .with_after(serde_json::to_value(&tenant).unwrap_or_default()),
            )
            .await;
        self.events.publish(LifecycleEvent::Created {
            tenant: tenant.clone(),
        });

        Ok(tenant)
    }

    /// Fetch a tenant. Soft-deleted tenants are `NotFound` here; use
    /// [`Self::get_admin`] for administrative reads.
    pub async fn get(&self, tenant_id: &str) -> TesseraResult<Tenant> {
        let tenant = self.tenants.get(tenant_id).await?;
        if tenant.deleted_at.is_some() {
            return Err(TesseraError::NotFound {
                entity: "tenant",
                id: tenant_id.to_string(),
            });
        }
        Ok(tenant)
    }

    /// Administrative read, including soft-deleted records.
    pub async fn get_admin(&self, tenant_id: &str) -> TesseraResult<Tenant> {
        self.tenants.get(tenant_id).await
    }

    /// List tenants matching the filter, ordered by tenant id.
    pub async fn list(&self, filter: &TenantFilter) -> TesseraResult<Vec<Tenant>> {
        self.tenants.list(filter).await
    }

    /// Patch mutable tenant fields. Identity, creation time, and
    /// status are untouchable here; residency is frozen once the
    /// tenant has data.
    pub async fn update(
        &self,
        tenant_id: &str,
        patch: UpdateTenant,
        actor: &str,
    ) -> TesseraResult<Tenant> {
        let _guard = self.locks.acquire(tenant_id).await;

        let mut tenant = self.get(tenant_id).await?;
        let before = serde_json::to_value(&tenant).unwrap_or_default();

        if let Some(region) = &patch.residency_region
            && *region != tenant.residency_region
        {
            if self.tenant_has_data(tenant_id).await {
                let err = TesseraError::FailedPrecondition {
                    message: "residency change requires a migration once data exists".into(),
                };
                self.audit
                    .failure(tenant_id, "tenant_update", actor, &err)
                    .await;
                return Err(err);
            }
            tenant.residency_region = region.clone();
        }

        if let Some(name) = patch.display_name {
            tenant.display_name = name;
        }
        if let Some(contact) = patch.admin_contact {
            tenant.admin_contact = contact;
        }
        if let Some(tier) = patch.tier
            && tier != tenant.tier
        {
            // Re-derive defaults for the new tier; explicit overrides
            // in the same patch are applied below.
            tenant.tier = tier;
            tenant.quotas = tier.default_quotas();
        }
        if let Some(overrides) = &patch.quotas {
            tenant.quotas = tenant.quotas.clone().with_overrides(overrides);
        }
        tenant.quotas.validate_for_tier(tenant.tier)?;
        if let Some(kms) = patch.kms_key_id {
            tenant.kms_key_id = kms;
        }
        if let Some(hold) = patch.legal_hold {
            tenant.legal_hold = hold;
        }
        if let Some(metadata) = patch.metadata {
            tenant.metadata = metadata;
        }
        tenant.updated_at = Utc::now();

        self.tenants.update(tenant.clone()).await?;
        self.audit
            .record(
                AuditRecord::new(tenant_id, "tenant_update", actor, AuditOutcome::Success)
                    .with_before(before)
                    .with_after(serde_json::to_value(&tenant).unwrap_or_default()),
            )
            .await;

        Ok(tenant)
    }

    /// Physically remove a tenant record. Allowed only after the
    /// lifecycle reached `deleted` (soft-delete before purge).
    pub async fn purge(&self, tenant_id: &str, actor: &str) -> TesseraResult<()> {
        let _guard = self.locks.acquire(tenant_id).await;

        let tenant = self.tenants.get(tenant_id).await?;
        if tenant.status != TenantStatus::Deleted {
            let err = TesseraError::FailedPrecondition {
                message: format!(
                    "purge requires status deleted, tenant is {}",
                    tenant.status
                ),
            };
            self.audit
                .failure(tenant_id, "tenant_purge", actor, &err)
                .await;
            return Err(err);
        }

        self.tenants.remove(tenant_id).await?;
        drop(_guard);
        self.locks.forget(tenant_id);

        info!(tenant_id = %tenant_id, "tenant purged");
        self.audit.success(tenant_id, "tenant_purge", actor).await;
        Ok(())
    }

    /// Registry-wide counts by status and tier (soft-deleted
    /// included).
    pub async fn stats(&self) -> TesseraResult<RegistryStats> {
        let tenants = self
            .tenants
            .list(&TenantFilter {
                include_deleted: true,
                ..Default::default()
            })
            .await?;
        let mut by_status = BTreeMap::new();
        let mut by_tier = BTreeMap::new();
        for tenant in &tenants {
            *by_status
                .entry(tenant.status.as_str().to_string())
                .or_insert(0) += 1;
            *by_tier.entry(tenant.tier.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(RegistryStats {
            total: tenants.len(),
            by_status,
            by_tier,
        })
    }

    /// Compute and persist the derived health score for a tenant.
    pub async fn record_health(
        &self,
        tenant_id: &str,
        signals: &HealthSignals,
    ) -> TesseraResult<u8> {
        let _guard = self.locks.acquire(tenant_id).await;

        let mut tenant = self.get(tenant_id).await?;
        let score = health_score(signals);
        tenant.health_score = score;
        tenant.updated_at = Utc::now();
        self.tenants.update(tenant).await?;
        Ok(score)
    }

    /// Whether any usage has been recorded for the tenant. Gates the
    /// residency freeze: with data present, region changes must go
    /// through a migration.
    async fn tenant_has_data(&self, tenant_id: &str) -> bool {
        match self.usage.get(tenant_id, BillingPeriod::current()).await {
            Ok(Some(meter)) => meter.storage_gb > 0.0 || meter.query_count > 0,
            _ => false,
        }
    }
}
