//! Integration tests for the capacity forecaster.

use std::collections::BTreeMap;

use tessera_billing::forecast::CapacityForecaster;
use tessera_core::error::TesseraError;
use tessera_core::models::forecast::{CapacityLevel, ForecastSample};

const EPS: f64 = 1e-6;

fn samples(tenant_id: &str, metric: &str, values: &[f64]) -> Vec<ForecastSample> {
    values
        .iter()
        .enumerate()
        .map(|(month, value)| ForecastSample {
            tenant_id: tenant_id.into(),
            metric: metric.into(),
            month: month as u32,
            value: *value,
        })
        .collect()
}

#[test]
fn linear_growth_classifies_critical_with_headroom() {
    let forecaster = CapacityForecaster::new(1.2);
    let series = samples("finance", "cpu_usage", &[60.0, 62.5, 65.0, 67.5, 70.0, 72.5]);

    let forecast = forecaster.forecast(&series, 3).unwrap();
    assert!((forecast.slope - 2.5).abs() < EPS);
    assert!((forecast.predicted_pct - 80.0).abs() < EPS);
    assert!((forecast.with_headroom_pct - 96.0).abs() < EPS);
    assert_eq!(forecast.level, CapacityLevel::Critical);
}

#[test]
fn flat_series_stays_ok() {
    let forecaster = CapacityForecaster::new(1.2);
    let series = samples("finance", "memory_usage", &[40.0, 40.0, 40.0, 40.0]);

    let forecast = forecaster.forecast(&series, 6).unwrap();
    assert!(forecast.slope.abs() < EPS);
    assert_eq!(forecast.level, CapacityLevel::Ok);
}

#[test]
fn too_few_samples_is_invalid() {
    let forecaster = CapacityForecaster::new(1.2);
    let series = samples("finance", "cpu_usage", &[60.0, 70.0]);
    let err = forecaster.forecast(&series, 3).unwrap_err();
    assert!(matches!(err, TesseraError::InvalidArgument { .. }));
}

#[test]
fn mixed_series_is_rejected() {
    let forecaster = CapacityForecaster::new(1.2);
    let mut series = samples("finance", "cpu_usage", &[60.0, 65.0, 70.0]);
    series[2].metric = "memory_usage".into();
    let err = forecaster.forecast(&series, 3).unwrap_err();
    assert!(matches!(err, TesseraError::InvalidArgument { .. }));
}

#[test]
fn batch_run_continues_past_failures() {
    let forecaster = CapacityForecaster::new(1.2);
    let mut all = samples("finance", "cpu_usage", &[60.0, 62.5, 65.0, 67.5]);
    // Only two samples for legal: an individual failure.
    all.extend(samples("legal", "cpu_usage", &[30.0, 31.0]));
    all.extend(samples("ops", "storage_usage", &[10.0, 11.0, 12.0]));

    let outcomes = forecaster.forecast_all(&all, 3);
    assert_eq!(outcomes.len(), 3);

    let by_tenant: BTreeMap<&str, bool> = outcomes
        .iter()
        .map(|o| (o.tenant_id.as_str(), o.result.is_ok()))
        .collect();
    assert_eq!(by_tenant["finance"], true);
    assert_eq!(by_tenant["legal"], false);
    assert_eq!(by_tenant["ops"], true);
}

#[test]
fn rebalancing_names_top_consumers_over_spread() {
    let forecaster = CapacityForecaster::new(1.2);
    let usage: BTreeMap<String, f64> = [
        ("alpha".to_string(), 95.0),
        ("beta".to_string(), 90.0),
        ("gamma".to_string(), 80.0),
        ("delta".to_string(), 75.0),
        ("epsilon".to_string(), 20.0),
    ]
    .into();

    let moves = forecaster.recommend_rebalancing(&usage, 0.3);
    // Top three above 70% of the max (66.5), highest first.
    assert_eq!(moves, vec!["alpha", "beta", "gamma"]);
}

#[test]
fn balanced_cluster_needs_no_rebalancing() {
    let forecaster = CapacityForecaster::new(1.2);
    let usage: BTreeMap<String, f64> = [
        ("alpha".to_string(), 80.0),
        ("beta".to_string(), 75.0),
        ("gamma".to_string(), 70.0),
    ]
    .into();
    assert!(forecaster.recommend_rebalancing(&usage, 0.3).is_empty());
    assert!(
        forecaster
            .recommend_rebalancing(&BTreeMap::new(), 0.3)
            .is_empty()
    );
}
