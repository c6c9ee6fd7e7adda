//! In-memory implementation of [`TenantStore`].

use dashmap::DashMap;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::tenant::{Tenant, TenantFilter};
use tessera_core::repository::TenantStore;

/// Tenant records keyed by tenant id.
#[derive(Default)]
pub struct MemoryTenantStore {
    tenants: DashMap<String, Tenant>,
}

impl MemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

impl TenantStore for MemoryTenantStore {
    async fn insert(&self, tenant: Tenant) -> TesseraResult<()> {
        match self.tenants.entry(tenant.tenant_id.clone()) {
            dashmap::Entry::Occupied(_) => Err(TesseraError::AlreadyExists {
                entity: "tenant",
                id: tenant.tenant_id,
            }),
            dashmap::Entry::Vacant(slot) => {
                slot.insert(tenant);
                Ok(())
            }
        }
    }

    async fn get(&self, tenant_id: &str) -> TesseraResult<Tenant> {
        self.tenants
            .get(tenant_id)
            .map(|t| t.clone())
            .ok_or_else(|| TesseraError::NotFound {
                entity: "tenant",
                id: tenant_id.to_string(),
            })
    }

    async fn list(&self, filter: &TenantFilter) -> TesseraResult<Vec<Tenant>> {
        let mut tenants: Vec<Tenant> = self
            .tenants
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        tenants.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        Ok(tenants)
    }

    async fn update(&self, tenant: Tenant) -> TesseraResult<()> {
        match self.tenants.get_mut(&tenant.tenant_id) {
            Some(mut slot) => {
                *slot = tenant;
                Ok(())
            }
            None => Err(TesseraError::NotFound {
                entity: "tenant",
                id: tenant.tenant_id,
            }),
        }
    }

    async fn remove(&self, tenant_id: &str) -> TesseraResult<()> {
        self.tenants
            .remove(tenant_id)
            .map(|_| ())
            .ok_or_else(|| TesseraError::NotFound {
                entity: "tenant",
                id: tenant_id.to_string(),
            })
    }
}
