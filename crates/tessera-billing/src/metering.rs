//! Usage metering record hooks.
//!
//! Thin write path from the data plane into the per-period usage
//! meters. Storage is a last-write-wins gauge; everything else is a
//! monotonic counter within the billing period. Reads are consistent
//! with writes from the same replica; cross-replica aggregation is the
//! store implementation's concern.

use std::sync::Arc;

use tessera_core::error::TesseraResult;
use tessera_core::models::usage::{BillingPeriod, UsageDelta, UsageMeter};
use tessera_core::repository::UsageStore;

pub struct MeteringService<U> {
    usage: Arc<U>,
}

impl<U: UsageStore> MeteringService<U> {
    pub fn new(usage: Arc<U>) -> Self {
        Self { usage }
    }

    pub async fn record_query(&self, tenant_id: &str, count: u64) -> TesseraResult<()> {
        self.usage
            .apply(tenant_id, BillingPeriod::current(), UsageDelta::Queries(count))
            .await
    }

    /// Gauge: the latest reported footprint replaces the stored value.
    pub async fn record_storage_gb(&self, tenant_id: &str, gb: f64) -> TesseraResult<()> {
        self.usage
            .apply(tenant_id, BillingPeriod::current(), UsageDelta::StorageGb(gb))
            .await
    }

    pub async fn record_compute_pod_hours(&self, tenant_id: &str, hours: f64) -> TesseraResult<()> {
        self.usage
            .apply(
                tenant_id,
                BillingPeriod::current(),
                UsageDelta::ComputePodHours(hours),
            )
            .await
    }

    pub async fn record_vector_ops(&self, tenant_id: &str, count: u64) -> TesseraResult<()> {
        self.usage
            .apply(tenant_id, BillingPeriod::current(), UsageDelta::VectorOps(count))
            .await
    }

    /// The meter for a tenant and period, zeroed when nothing has been
    /// recorded yet.
    pub async fn get_usage(
        &self,
        tenant_id: &str,
        period: BillingPeriod,
    ) -> TesseraResult<UsageMeter> {
        Ok(self
            .usage
            .get(tenant_id, period)
            .await?
            .unwrap_or_else(|| UsageMeter::empty(tenant_id, period)))
    }

    /// All of a tenant's meters, oldest period first.
    pub async fn history(&self, tenant_id: &str) -> TesseraResult<Vec<UsageMeter>> {
        self.usage.history(tenant_id).await
    }
}
