//! Cost and chargeback computation.
//!
//! `final = (direct + overhead) * (1 - discount)`, where direct cost
//! is the unit-priced sum of the metered components, overhead is a
//! flat platform rate, and the discount comes from a volume table on
//! the period's query count. Anomaly detection compares consecutive
//! monthly finals and names the component that moved the most.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tessera_core::error::TesseraResult;
use tessera_core::models::usage::{BillingPeriod, UsageMeter};
use tessera_core::repository::UsageStore;

use crate::config::BillingConfig;

/// Volume discount rate for a period's query count. Lower bounds are
/// closed: exactly 100 000 queries already earns 30 %.
pub fn volume_discount(query_count: u64) -> f64 {
    if query_count >= 1_000_000 {
        0.40
    } else if query_count >= 100_000 {
        0.30
    } else if query_count >= 10_000 {
        0.15
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CostBreakdown {
    pub tenant_id: String,
    pub period: BillingPeriod,
    pub query_cost: f64,
    pub storage_cost: f64,
    pub compute_cost: f64,
    pub vector_cost: f64,
    pub direct: f64,
    pub overhead: f64,
    pub discount_rate: f64,
    pub final_cost: f64,
    /// Zero when no queries were served.
    pub cost_per_query: f64,
}

impl CostBreakdown {
    /// The component contributing the most to direct cost.
    pub fn dominant_component(&self) -> &'static str {
        let components = [
            (self.query_cost, "query"),
            (self.storage_cost, "storage"),
            (self.compute_cost, "compute"),
            (self.vector_cost, "vector-op"),
        ];
        components
            .into_iter()
            .max_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, name)| name)
            .unwrap_or("query")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub breakdown: CostBreakdown,
    pub generated_at: DateTime<Utc>,
}

/// A month-over-month cost jump beyond the configured ratio.
#[derive(Debug, Clone, Serialize)]
pub struct CostAnomaly {
    pub tenant_id: String,
    pub period: BillingPeriod,
    pub previous_cost: f64,
    pub current_cost: f64,
    /// Relative increase, `0.8` meaning +80 %.
    pub jump_ratio: f64,
    /// The component whose cost grew the most over the period.
    pub root_hint: &'static str,
}

/// Cross-tenant rollup for one billing period.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformSummary {
    pub period: BillingPeriod,
    pub tenant_count: usize,
    pub total_direct: f64,
    pub total_final: f64,
    pub final_by_tenant: BTreeMap<String, f64>,
}

pub struct CostEngine<U> {
    usage: Arc<U>,
    config: BillingConfig,
}

impl<U: UsageStore> CostEngine<U> {
    pub fn new(usage: Arc<U>, config: BillingConfig) -> Self {
        Self { usage, config }
    }

    /// Price one usage meter.
    pub fn breakdown(&self, meter: &UsageMeter) -> CostBreakdown {
        let prices = self.config.prices;
        let query_cost = meter.query_count as f64 * prices.per_query;
        let storage_cost = meter.storage_gb * prices.per_storage_gb;
        let compute_cost = meter.compute_pod_hours * prices.per_compute_pod_hour;
        let vector_cost = meter.vector_operations as f64 * prices.per_vector_op;
        let direct = query_cost + storage_cost + compute_cost + vector_cost;
        let overhead = direct * self.config.overhead_rate;
        let discount_rate = volume_discount(meter.query_count);
        let final_cost = (direct + overhead) * (1.0 - discount_rate);
        let cost_per_query = if meter.query_count == 0 {
            0.0
        } else {
            final_cost / meter.query_count as f64
        };
        CostBreakdown {
            tenant_id: meter.tenant_id.clone(),
            period: meter.period,
            query_cost,
            storage_cost,
            compute_cost,
            vector_cost,
            direct,
            overhead,
            discount_rate,
            final_cost,
            cost_per_query,
        }
    }

    /// Price a tenant's recorded usage for one period. A period with
    /// no usage prices to zero rather than failing.
    pub async fn invoice(&self, tenant_id: &str, period: BillingPeriod) -> TesseraResult<Invoice> {
        let meter = self
            .usage
            .get(tenant_id, period)
            .await?
            .unwrap_or_else(|| UsageMeter::empty(tenant_id, period));
        Ok(Invoice {
            breakdown: self.breakdown(&meter),
            generated_at: Utc::now(),
        })
    }

    /// Whether the sum attributed across tenants matches the actual
    /// bill within tolerance (relative to the actual bill).
    pub fn validate_attribution(
        &self,
        total_attributed: f64,
        actual_bill: f64,
        tolerance: Option<f64>,
    ) -> bool {
        let tolerance = tolerance.unwrap_or(self.config.attribution_tolerance);
        if actual_bill == 0.0 {
            return total_attributed.abs() <= f64::EPSILON;
        }
        ((total_attributed - actual_bill) / actual_bill).abs() <= tolerance
    }

    /// Flag a month-over-month cost jump beyond the configured ratio,
    /// using up to the last twelve recorded periods.
    pub async fn detect_anomaly(&self, tenant_id: &str) -> TesseraResult<Option<CostAnomaly>> {
        let history = self.usage.history(tenant_id).await?;
        let recent: Vec<&UsageMeter> = history.iter().rev().take(12).rev().collect();
        let [.., previous, current] = recent.as_slice() else {
            return Ok(None);
        };
        let previous_cost = self.breakdown(previous).final_cost;
        let current_breakdown = self.breakdown(current);
        let current_cost = current_breakdown.final_cost;
        if previous_cost <= 0.0 || current_cost <= previous_cost * (1.0 + self.config.anomaly_jump_ratio)
        {
            return Ok(None);
        }

        // Name the component that grew the most.
        let previous_breakdown = self.breakdown(previous);
        let growth = [
            (
                current_breakdown.query_cost - previous_breakdown.query_cost,
                "query",
            ),
            (
                current_breakdown.storage_cost - previous_breakdown.storage_cost,
                "storage",
            ),
            (
                current_breakdown.compute_cost - previous_breakdown.compute_cost,
                "compute",
            ),
            (
                current_breakdown.vector_cost - previous_breakdown.vector_cost,
                "vector-op",
            ),
        ];
        let root_hint = growth
            .into_iter()
            .max_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, name)| name)
            .unwrap_or("query");

        Ok(Some(CostAnomaly {
            tenant_id: tenant_id.to_string(),
            period: current.period,
            previous_cost,
            current_cost,
            jump_ratio: current_cost / previous_cost - 1.0,
            root_hint,
        }))
    }

    /// Cost rollup across every tenant with usage in the period.
    pub async fn platform_summary(&self, period: BillingPeriod) -> TesseraResult<PlatformSummary> {
        let meters = self.usage.all_for_period(period).await?;
        let mut total_direct = 0.0;
        let mut total_final = 0.0;
        let mut final_by_tenant = BTreeMap::new();
        for meter in &meters {
            let breakdown = self.breakdown(meter);
            total_direct += breakdown.direct;
            total_final += breakdown.final_cost;
            final_by_tenant.insert(meter.tenant_id.clone(), breakdown.final_cost);
        }
        Ok(PlatformSummary {
            period,
            tenant_count: meters.len(),
            total_direct,
            total_final,
            final_by_tenant,
        })
    }
}
