//! In-memory implementation of [`UsageStore`].

use dashmap::DashMap;
use tessera_core::error::TesseraResult;
use tessera_core::models::usage::{BillingPeriod, UsageDelta, UsageMeter};
use tessera_core::repository::UsageStore;

/// Usage meters keyed by `(tenant_id, period)`. Reads are consistent
/// with writes from the same replica.
#[derive(Default)]
pub struct MemoryUsageStore {
    meters: DashMap<(String, BillingPeriod), UsageMeter>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageStore for MemoryUsageStore {
    async fn apply(
        &self,
        tenant_id: &str,
        period: BillingPeriod,
        delta: UsageDelta,
    ) -> TesseraResult<()> {
        self.meters
            .entry((tenant_id.to_string(), period))
            .or_insert_with(|| UsageMeter::empty(tenant_id, period))
            .apply(&delta);
        Ok(())
    }

    async fn get(&self, tenant_id: &str, period: BillingPeriod) -> TesseraResult<Option<UsageMeter>> {
        Ok(self
            .meters
            .get(&(tenant_id.to_string(), period))
            .map(|m| m.clone()))
    }

    async fn history(&self, tenant_id: &str) -> TesseraResult<Vec<UsageMeter>> {
        let mut meters: Vec<UsageMeter> = self
            .meters
            .iter()
            .filter(|entry| entry.key().0 == tenant_id)
            .map(|entry| entry.value().clone())
            .collect();
        meters.sort_by_key(|m| m.period);
        Ok(meters)
    }

    async fn all_for_period(&self, period: BillingPeriod) -> TesseraResult<Vec<UsageMeter>> {
        let mut meters: Vec<UsageMeter> = self
            .meters
            .iter()
            .filter(|entry| entry.key().1 == period)
            .map(|entry| entry.value().clone())
            .collect();
        meters.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        Ok(meters)
    }
}
