//! Billing configuration.

/// Unit prices per metered component, in account currency.
#[derive(Debug, Clone, Copy)]
pub struct UnitPrices {
    pub per_query: f64,
    /// Per GB held over the billing period (gauge, not GB-seconds).
    pub per_storage_gb: f64,
    pub per_compute_pod_hour: f64,
    pub per_vector_op: f64,
}

impl Default for UnitPrices {
    fn default() -> Self {
        Self {
            per_query: 0.001,
            per_storage_gb: 0.10,
            per_compute_pod_hour: 0.50,
            per_vector_op: 0.000_1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BillingConfig {
    pub prices: UnitPrices,
    /// Platform overhead applied on top of direct cost.
    pub overhead_rate: f64,
    /// Allowed relative gap in `validate_attribution`.
    pub attribution_tolerance: f64,
    /// Month-over-month jump that flags a cost anomaly: `0.5` means
    /// current above 150 % of the previous period.
    pub anomaly_jump_ratio: f64,
    /// Headroom multiplier applied to capacity predictions.
    pub headroom: f64,
    /// Relative spread `(max - min) / max` beyond which rebalancing is
    /// recommended.
    pub rebalance_spread_threshold: f64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            prices: UnitPrices::default(),
            overhead_rate: 0.20,
            attribution_tolerance: 0.10,
            anomaly_jump_ratio: 0.50,
            headroom: 1.2,
            rebalance_spread_threshold: 0.30,
        }
    }
}
