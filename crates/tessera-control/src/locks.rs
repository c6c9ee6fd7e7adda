//! Per-tenant writer locks.
//!
//! The registry and the lifecycle manager share one lock map so a
//! metadata update can never interleave with a status transition for
//! the same tenant. Readers never take these locks.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct TenantLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the writer lock for one tenant. Lock entries are
    /// created on first use and retained; the set of tenants is small
    /// relative to the data plane.
    pub async fn acquire(&self, tenant_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock entry for a purged tenant.
    pub fn forget(&self, tenant_id: &str) {
        self.locks.remove(tenant_id);
    }
}
