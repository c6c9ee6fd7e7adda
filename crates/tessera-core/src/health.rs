//! Derived tenant health scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw signals fed into the health score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct HealthSignals {
    pub latency_p95_ms: f64,
    /// Error rate as a fraction, `0.02` = 2 %.
    pub error_rate: f64,
    /// Query success rate as a fraction, `0.97` = 97 %.
    pub query_success_rate: f64,
    /// Storage utilization as a fraction of quota, `0.0..`.
    pub storage_utilization: f64,
}

/// Last-computed score and the inputs that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReading {
    pub score: u8,
    pub signals: HealthSignals,
    pub computed_at: DateTime<Utc>,
}

/// Compute a 0..=100 health score.
///
/// Deductions: 10 points per 100 ms of p95 latency over 500 ms
/// (capped at 30), 20 points per percent of error rate (capped at
/// 40), 3 points per percent of query success below 95 % (capped at
/// 30), a flat 20 when storage utilization exceeds 0.9.
pub fn health_score(signals: &HealthSignals) -> u8 {
    let mut score = 100.0_f64;

    if signals.latency_p95_ms > 500.0 {
        let over = (signals.latency_p95_ms - 500.0) / 100.0;
        score -= (over * 10.0).min(30.0);
    }

    if signals.error_rate > 0.0 {
        score -= (signals.error_rate * 100.0 * 20.0).min(40.0);
    }

    if signals.query_success_rate < 0.95 {
        let below = (0.95 - signals.query_success_rate) * 100.0;
        score -= (below * 3.0).min(30.0);
    }

    if signals.storage_utilization > 0.9 {
        score -= 20.0;
    }

    score.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> HealthSignals {
        HealthSignals {
            latency_p95_ms: 120.0,
            error_rate: 0.0,
            query_success_rate: 1.0,
            storage_utilization: 0.3,
        }
    }

    #[test]
    fn perfect_signals_score_100() {
        assert_eq!(health_score(&healthy()), 100);
    }

    #[test]
    fn latency_deduction_capped() {
        let mut s = healthy();
        s.latency_p95_ms = 700.0; // 200ms over -> -20
        assert_eq!(health_score(&s), 80);
        s.latency_p95_ms = 5_000.0; // way over -> capped at -30
        assert_eq!(health_score(&s), 70);
    }

    #[test]
    fn error_rate_deduction_capped() {
        let mut s = healthy();
        s.error_rate = 0.01; // 1% -> -20
        assert_eq!(health_score(&s), 80);
        s.error_rate = 0.10; // capped at -40
        assert_eq!(health_score(&s), 60);
    }

    #[test]
    fn success_rate_deduction() {
        let mut s = healthy();
        s.query_success_rate = 0.90; // 5% below -> -15
        assert_eq!(health_score(&s), 85);
        s.query_success_rate = 0.0; // capped at -30
        assert_eq!(health_score(&s), 70);
    }

    #[test]
    fn storage_pressure_flat_deduction() {
        let mut s = healthy();
        s.storage_utilization = 0.95;
        assert_eq!(health_score(&s), 80);
        s.storage_utilization = 0.9; // boundary is exclusive
        assert_eq!(health_score(&s), 100);
    }

    #[test]
    fn floor_is_zero() {
        let s = HealthSignals {
            latency_p95_ms: 10_000.0,
            error_rate: 1.0,
            query_success_rate: 0.0,
            storage_utilization: 1.0,
        };
        assert_eq!(health_score(&s), 0);
    }
}
