//! Integration tests for the rate enforcer.

use std::sync::Arc;
use std::time::Duration;

use tessera_control::audit::AuditTrail;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::audit::AuditOutcome;
use tessera_core::models::usage::QuotaMetric;
use tessera_core::repository::CounterStore;
use tessera_enforce::rate::{Mitigation, RateEnforcer, ThrottleState};
use tessera_memstore::{MemoryAuditSink, MemoryCounterStore};

fn setup() -> (
    RateEnforcer<MemoryCounterStore, MemoryAuditSink>,
    Arc<MemoryAuditSink>,
    Arc<ThrottleState>,
) {
    let sink = Arc::new(MemoryAuditSink::new());
    let throttle = Arc::new(ThrottleState::new());
    let enforcer = RateEnforcer::new(
        Arc::new(MemoryCounterStore::new()),
        AuditTrail::new(sink.clone()),
        throttle.clone(),
    );
    (enforcer, sink, throttle)
}

/// Counter store that is always down.
struct DownCounterStore;

impl CounterStore for DownCounterStore {
    async fn incr_with_ttl(&self, _key: &str, _amount: i64, _ttl: Duration) -> TesseraResult<i64> {
        Err(TesseraError::Unavailable {
            reason: "counter store down".into(),
        })
    }

    async fn get(&self, _key: &str) -> TesseraResult<Option<i64>> {
        Err(TesseraError::Unavailable {
            reason: "counter store down".into(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn sixth_call_in_bucket_is_rejected() {
    let (enforcer, _, _) = setup();
    for i in 1..=5 {
        let decision = enforcer.check("finance", 5).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.current, i);
        assert_eq!(decision.remaining, 5 - i);
    }
    let decision = enforcer.check("finance", 5).await.unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.current, 6);
    assert_eq!(decision.remaining, 0);
    let retry = decision.retry_after_secs.unwrap();
    assert!(retry > 0 && retry <= 60, "retry_after {retry} out of range");
}

#[tokio::test(start_paused = true)]
async fn bucket_rolls_over_after_a_minute() {
    let (enforcer, _, _) = setup();
    for _ in 0..5 {
        enforcer.check("finance", 5).await.unwrap();
    }
    assert!(!enforcer.check("finance", 5).await.unwrap().allowed);

    tokio::time::advance(Duration::from_secs(60)).await;
    let decision = enforcer.check("finance", 5).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.current, 1);
}

#[tokio::test(start_paused = true)]
async fn tenants_have_independent_buckets() {
    let (enforcer, _, _) = setup();
    for _ in 0..5 {
        enforcer.check("finance", 5).await.unwrap();
    }
    assert!(!enforcer.check("finance", 5).await.unwrap().allowed);
    assert!(enforcer.check("legal", 5).await.unwrap().allowed);
}

#[tokio::test]
async fn store_outage_fails_open_with_degraded_audit() {
    let sink = Arc::new(MemoryAuditSink::new());
    let enforcer = RateEnforcer::new(
        Arc::new(DownCounterStore),
        AuditTrail::new(sink.clone()),
        Arc::new(ThrottleState::new()),
    );

    let decision = enforcer.check("finance", 5).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.current, 0);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, "rate_check");
    assert_eq!(records[0].outcome, AuditOutcome::Degraded);
    assert!(!records[0].user_visible);
}

#[tokio::test(start_paused = true)]
async fn reduced_rate_halves_effective_limit() {
    let (enforcer, _, throttle) = setup();
    throttle.impose(
        "finance",
        Mitigation::ReduceRate { divisor: 2 },
        Duration::from_secs(300),
    );

    // Limit 10, effective 5.
    for _ in 0..5 {
        assert!(enforcer.check("finance", 10).await.unwrap().allowed);
    }
    assert!(!enforcer.check("finance", 10).await.unwrap().allowed);
}

#[tokio::test(start_paused = true)]
async fn circuit_break_rejects_then_auto_recovers() {
    let (enforcer, _, throttle) = setup();
    throttle.impose("finance", Mitigation::CircuitBreak, Duration::from_secs(300));

    let err = enforcer.check("finance", 100).await.unwrap_err();
    assert!(matches!(err, TesseraError::Unavailable { .. }));

    tokio::time::advance(Duration::from_secs(301)).await;
    assert!(enforcer.check("finance", 100).await.unwrap().allowed);
}

#[tokio::test(start_paused = true)]
async fn quota_metric_exhaustion() {
    let (enforcer, _, _) = setup();
    for i in 1..=3 {
        let count = enforcer
            .note_quota_usage("finance", QuotaMetric::QueriesPerDay, 1, 3)
            .await
            .unwrap();
        assert_eq!(count, i);
    }
    let err = enforcer
        .note_quota_usage("finance", QuotaMetric::QueriesPerDay, 1, 3)
        .await
        .unwrap_err();
    match err {
        TesseraError::ResourceExhausted {
            resource,
            retry_after_secs,
        } => {
            assert_eq!(resource, "queries_per_day");
            assert!(retry_after_secs > 0 && retry_after_secs <= 86_400);
        }
        other => panic!("expected ResourceExhausted, got {other:?}"),
    }

    // Metrics are accounted independently.
    assert!(
        enforcer
            .note_quota_usage("finance", QuotaMetric::Documents, 1, 3)
            .await
            .is_ok()
    );
}

#[tokio::test(start_paused = true)]
async fn quota_amounts_aggregate_within_the_day() {
    let (enforcer, _, _) = setup();
    let count = enforcer
        .note_quota_usage("finance", QuotaMetric::Documents, 2, 5)
        .await
        .unwrap();
    assert_eq!(count, 2);
    let count = enforcer
        .note_quota_usage("finance", QuotaMetric::Documents, 3, 5)
        .await
        .unwrap();
    assert_eq!(count, 5);

    // A batch pushing the total past the ceiling is rejected.
    let err = enforcer
        .note_quota_usage("finance", QuotaMetric::Documents, 2, 5)
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::ResourceExhausted { .. }));
}

#[tokio::test(start_paused = true)]
async fn quota_day_bucket_rolls_over() {
    let (enforcer, _, _) = setup();
    for _ in 0..3 {
        enforcer
            .note_quota_usage("finance", QuotaMetric::QueriesPerDay, 1, 3)
            .await
            .unwrap();
    }
    assert!(
        enforcer
            .note_quota_usage("finance", QuotaMetric::QueriesPerDay, 1, 3)
            .await
            .is_err()
    );

    tokio::time::advance(Duration::from_secs(86_400)).await;
    let count = enforcer
        .note_quota_usage("finance", QuotaMetric::QueriesPerDay, 1, 3)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_checks_observe_monotonic_counts() {
    let (enforcer, _, _) = setup();
    let enforcer = Arc::new(enforcer);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let enforcer = enforcer.clone();
        handles.push(tokio::spawn(async move {
            enforcer.check("finance", 100).await.unwrap().current
        }));
    }
    let mut counts = Vec::new();
    for handle in handles {
        counts.push(handle.await.unwrap());
    }
    counts.sort_unstable();
    assert_eq!(counts, (1..=10).collect::<Vec<u64>>());
}
