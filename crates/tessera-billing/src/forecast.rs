//! Capacity forecasting and rebalancing recommendations.
//!
//! A forecast fits `value = slope * month + intercept` to at least
//! three monthly aggregates by ordinary least squares, predicts the
//! value `months_ahead` past the last sample, applies a headroom
//! multiplier, and bands the result. The batch run keeps going past
//! individual failures so one tenant with bad data cannot blank the
//! whole report.

use std::collections::BTreeMap;

use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::forecast::{CapacityForecast, CapacityLevel, ForecastSample};
use tracing::debug;

pub const MIN_SAMPLES: usize = 3;

/// One entry of a batch forecast run.
#[derive(Debug)]
pub struct ForecastOutcome {
    pub tenant_id: String,
    pub metric: String,
    pub result: TesseraResult<CapacityForecast>,
}

pub struct CapacityForecaster {
    headroom: f64,
}

impl CapacityForecaster {
    pub fn new(headroom: f64) -> Self {
        Self { headroom }
    }

    /// Forecast one tenant/metric series. All samples must belong to
    /// the same pair; months need not be contiguous.
    pub fn forecast(
        &self,
        samples: &[ForecastSample],
        months_ahead: u32,
    ) -> TesseraResult<CapacityForecast> {
        if samples.len() < MIN_SAMPLES {
            return Err(TesseraError::InvalidArgument {
                message: format!(
                    "forecast needs at least {MIN_SAMPLES} samples, got {}",
                    samples.len()
                ),
            });
        }
        let first = &samples[0];
        if samples
            .iter()
            .any(|s| s.tenant_id != first.tenant_id || s.metric != first.metric)
        {
            return Err(TesseraError::InvalidArgument {
                message: "samples span more than one tenant/metric series".into(),
            });
        }

        let n = samples.len() as f64;
        let sum_x: f64 = samples.iter().map(|s| s.month as f64).sum();
        let sum_y: f64 = samples.iter().map(|s| s.value).sum();
        let sum_xy: f64 = samples.iter().map(|s| s.month as f64 * s.value).sum();
        let sum_xx: f64 = samples.iter().map(|s| (s.month as f64).powi(2)).sum();
        let denominator = n * sum_xx - sum_x * sum_x;
        if denominator.abs() < f64::EPSILON {
            return Err(TesseraError::InvalidArgument {
                message: "samples share a single month, no trend to fit".into(),
            });
        }
        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        let intercept = (sum_y - slope * sum_x) / n;

        let last_month = samples.iter().map(|s| s.month).max().unwrap_or(0);
        let predicted_pct = slope * (last_month + months_ahead) as f64 + intercept;
        let with_headroom_pct = predicted_pct * self.headroom;
        let level = CapacityLevel::classify(with_headroom_pct);
        debug!(
            tenant_id = %first.tenant_id,
            metric = %first.metric,
            slope,
            predicted_pct,
            with_headroom_pct,
            level = level.as_str(),
            "capacity forecast"
        );
        Ok(CapacityForecast {
            tenant_id: first.tenant_id.clone(),
            metric: first.metric.clone(),
            slope,
            predicted_pct,
            with_headroom_pct,
            level,
            months_ahead,
        })
    }

    /// Batch run over a mixed sample set, grouped by tenant/metric.
    /// Individual failures are reported in place, never propagated.
    pub fn forecast_all(
        &self,
        samples: &[ForecastSample],
        months_ahead: u32,
    ) -> Vec<ForecastOutcome> {
        let mut series: BTreeMap<(String, String), Vec<ForecastSample>> = BTreeMap::new();
        for sample in samples {
            series
                .entry((sample.tenant_id.clone(), sample.metric.clone()))
                .or_default()
                .push(sample.clone());
        }
        series
            .into_iter()
            .map(|((tenant_id, metric), mut group)| {
                group.sort_by_key(|s| s.month);
                ForecastOutcome {
                    result: self.forecast(&group, months_ahead),
                    tenant_id,
                    metric,
                }
            })
            .collect()
    }

    /// Propose migrations when utilization is lopsided: the top three
    /// consumers above 70 % of the maximum, once the relative spread
    /// `(max - min) / max` exceeds `spread_threshold`.
    pub fn recommend_rebalancing(
        &self,
        usage_pct: &BTreeMap<String, f64>,
        spread_threshold: f64,
    ) -> Vec<String> {
        let Some(max) = usage_pct.values().copied().reduce(f64::max) else {
            return Vec::new();
        };
        let Some(min) = usage_pct.values().copied().reduce(f64::min) else {
            return Vec::new();
        };
        if max <= 0.0 || (max - min) / max <= spread_threshold {
            return Vec::new();
        }
        let cutoff = 0.7 * max;
        let mut candidates: Vec<(&String, f64)> = usage_pct
            .iter()
            .filter(|(_, pct)| **pct > cutoff)
            .map(|(id, pct)| (id, *pct))
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates
            .into_iter()
            .take(3)
            .map(|(id, _)| id.clone())
            .collect()
    }
}
