//! Capacity forecasting domain model.

use serde::{Deserialize, Serialize};

/// One monthly aggregate for a tenant/metric pair. Immutable once
/// written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastSample {
    pub tenant_id: String,
    /// e.g. `cpu_usage`, `memory_usage`, `storage_usage`.
    pub metric: String,
    /// Monotonic month index (months since an arbitrary epoch).
    pub month: u32,
    /// Utilization percentage, 0..=100 (may exceed 100 when
    /// oversubscribed).
    pub value: f64,
}

/// Classification bands for a headroom-adjusted prediction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum CapacityLevel {
    Ok,
    Caution,
    Warning,
    Critical,
}

impl CapacityLevel {
    /// Band a headroom-adjusted predicted percentage.
    pub fn classify(predicted_pct: f64) -> Self {
        if predicted_pct >= 90.0 {
            CapacityLevel::Critical
        } else if predicted_pct >= 80.0 {
            CapacityLevel::Warning
        } else if predicted_pct >= 70.0 {
            CapacityLevel::Caution
        } else {
            CapacityLevel::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityLevel::Ok => "OK",
            CapacityLevel::Caution => "CAUTION",
            CapacityLevel::Warning => "WARNING",
            CapacityLevel::Critical => "CRITICAL",
        }
    }
}

/// Result of a single forecast run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityForecast {
    pub tenant_id: String,
    pub metric: String,
    /// OLS slope, percentage points per month.
    pub slope: f64,
    /// Raw prediction at `last_month + months_ahead`.
    pub predicted_pct: f64,
    /// Prediction with the headroom multiplier applied.
    pub with_headroom_pct: f64,
    pub level: CapacityLevel,
    pub months_ahead: u32,
}
