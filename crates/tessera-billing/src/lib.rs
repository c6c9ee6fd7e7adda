//! Tessera Billing — the money-and-capacity side of the control
//! plane: per-period usage metering, cost/chargeback computation with
//! volume discounts, cost-anomaly detection, capacity forecasting, and
//! rebalancing recommendations.
//!
//! Everything here is derived state: the usage meters behind the
//! `tessera-core::UsageStore` trait are the only inputs.

pub mod config;
pub mod cost;
pub mod forecast;
pub mod metering;

pub use config::{BillingConfig, UnitPrices};
pub use cost::{CostAnomaly, CostBreakdown, CostEngine, Invoice, PlatformSummary};
pub use forecast::{CapacityForecaster, ForecastOutcome};
pub use metering::MeteringService;
