//! Recording subsystem adapter.
//!
//! Stands in for the relational/vector/object/cache/monitoring
//! adapters in tests and single-process deployments. State is
//! set-based, so every action is idempotent by `(tenant_id, action)`
//! as the adapter contract requires. Individual actions can be forced
//! to fail for cascade and fail-open testing.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::certificate::DeletionReceipt;
use tessera_core::models::tenant::Tenant;
use tessera_core::repository::SubsystemAdapter;

/// Per-tenant state as seen by one subsystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterTenantState {
    pub provisioned: bool,
    pub suspended: bool,
    pub deleted: bool,
}

pub struct RecordingAdapter {
    name: &'static str,
    state: DashMap<String, AdapterTenantState>,
    /// Every call in arrival order, as `(tenant_id, action)`.
    calls: Mutex<Vec<(String, String)>>,
    /// Actions that currently fail with `Unavailable`.
    failing: DashMap<String, ()>,
    /// When set, `on_delete` reports residual data.
    residual_on_delete: AtomicBool,
}

impl RecordingAdapter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            failing: DashMap::new(),
            residual_on_delete: AtomicBool::new(false),
        }
    }

    /// Force `action` (`provision`, `suspend`, `activate`, `delete`,
    /// `verify`) to fail until [`Self::heal`] is called.
    pub fn fail_action(&self, action: &str) {
        self.failing.insert(action.to_string(), ());
    }

    pub fn heal(&self) {
        self.failing.clear();
    }

    /// Make subsequent deletions report residual data.
    pub fn set_residual_on_delete(&self, residual: bool) {
        self.residual_on_delete.store(residual, Ordering::SeqCst);
    }

    pub fn tenant_state(&self, tenant_id: &str) -> AdapterTenantState {
        self.state
            .get(tenant_id)
            .map(|s| *s)
            .unwrap_or_default()
    }

    /// Number of calls recorded for `(tenant_id, action)`.
    pub fn call_count(&self, tenant_id: &str, action: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(t, a)| t == tenant_id && a == action)
            .count()
    }

    fn record(&self, tenant_id: &str, action: &str) -> TesseraResult<()> {
        self.calls
            .lock()
            .push((tenant_id.to_string(), action.to_string()));
        if self.failing.contains_key(action) {
            return Err(TesseraError::Unavailable {
                reason: format!("{} adapter: {action} failing", self.name),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SubsystemAdapter for RecordingAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn on_provision(&self, tenant: &Tenant) -> TesseraResult<()> {
        self.record(&tenant.tenant_id, "provision")?;
        self.state
            .entry(tenant.tenant_id.clone())
            .or_default()
            .provisioned = true;
        Ok(())
    }

    async fn on_suspend(&self, tenant_id: &str) -> TesseraResult<()> {
        self.record(tenant_id, "suspend")?;
        self.state.entry(tenant_id.to_string()).or_default().suspended = true;
        Ok(())
    }

    async fn on_activate(&self, tenant_id: &str) -> TesseraResult<()> {
        self.record(tenant_id, "activate")?;
        self.state.entry(tenant_id.to_string()).or_default().suspended = false;
        Ok(())
    }

    async fn on_delete(&self, tenant_id: &str) -> TesseraResult<DeletionReceipt> {
        self.record(tenant_id, "delete")?;
        let residual = self.residual_on_delete.load(Ordering::SeqCst);
        let mut state = self.state.entry(tenant_id.to_string()).or_default();
        state.deleted = !residual;
        Ok(DeletionReceipt {
            system: self.name.to_string(),
            deleted_at: Utc::now(),
            residual,
        })
    }

    async fn verify_deleted(&self, tenant_id: &str) -> TesseraResult<bool> {
        self.record(tenant_id, "verify")?;
        Ok(self.tenant_state(tenant_id).deleted)
    }
}
