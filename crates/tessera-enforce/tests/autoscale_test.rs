//! Integration tests for the autoscaling policy.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tessera_control::audit::AuditTrail;
use tessera_core::models::tenant::{IsolationModel, Tenant, TenantStatus, Tier};
use tessera_enforce::autoscale::{AutoscalePolicy, TierScalePolicy};
use tessera_memstore::MemoryAuditSink;

fn tenant(id: &str, tier: Tier) -> Tenant {
    let now = Utc::now();
    Tenant {
        tenant_id: id.into(),
        display_name: id.into(),
        admin_contact: format!("admin@{id}.example"),
        tier,
        status: TenantStatus::Active,
        isolation: IsolationModel::SharedSchema,
        residency_region: "eu-west-1".into(),
        kms_key_id: None,
        legal_hold: false,
        quotas: tier.default_quotas(),
        health_score: 100,
        metadata: serde_json::json!({}),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

fn platinum_policy(max_replicas: u32) -> TierScalePolicy {
    TierScalePolicy {
        min_replicas: 1,
        max_replicas,
        target_per_replica: 10,
        scale_up_cooldown: Duration::ZERO,
        scale_down_cooldown: Duration::ZERO,
        quota_pct: 40.0,
        sla_target: 0.999,
    }
}

fn setup(
    cluster_capacity: u32,
    policy: TierScalePolicy,
) -> (AutoscalePolicy<MemoryAuditSink>, Arc<MemoryAuditSink>) {
    let sink = Arc::new(MemoryAuditSink::new());
    let mut autoscaler = AutoscalePolicy::new(cluster_capacity, AuditTrail::new(sink.clone()));
    autoscaler.set_policy(Tier::Platinum, policy);
    (autoscaler, sink)
}

#[tokio::test]
async fn deep_queue_scales_within_cluster_quota() {
    let (autoscaler, _) = setup(100, platinum_policy(30));
    let tenant = tenant("finance", Tier::Platinum);

    // ceil(500 / 10) = 50, clamped to max 30; 30% of the cluster is
    // within the 40% quota.
    let decision = autoscaler.evaluate(&tenant, 500).await;
    assert!(decision.approved);
    assert_eq!(decision.proposed, 30);
    assert_eq!(autoscaler.replicas(&tenant), 30);
}

#[tokio::test]
async fn cluster_quota_validator_rejects_oversized_share() {
    let (autoscaler, sink) = setup(100, platinum_policy(50));
    let tenant = tenant("finance", Tier::Platinum);

    let decision = autoscaler.evaluate(&tenant, 500).await;
    assert!(!decision.approved);
    assert_eq!(decision.proposed, 50);
    assert_eq!(decision.reason, "quota exceeded: 50% > 40%");
    // The rejected decision is not applied.
    assert_eq!(autoscaler.replicas(&tenant), 1);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, "scale_event");
    assert_eq!(records[0].after.as_ref().unwrap()["reason"], decision.reason);
}

#[tokio::test]
async fn empty_queue_settles_at_tier_minimum() {
    let (autoscaler, _) = setup(100, platinum_policy(30));
    let tenant = tenant("finance", Tier::Platinum);

    autoscaler.evaluate(&tenant, 200).await;
    assert_eq!(autoscaler.replicas(&tenant), 20);

    let decision = autoscaler.evaluate(&tenant, 0).await;
    assert!(decision.approved);
    assert_eq!(decision.proposed, 1);
    assert_eq!(autoscaler.replicas(&tenant), 1);
}

#[tokio::test(start_paused = true)]
async fn scale_up_cooldown_defers_the_next_increase() {
    let mut policy = platinum_policy(30);
    policy.scale_up_cooldown = Duration::from_secs(60);
    let (autoscaler, _) = setup(100, policy);
    let tenant = tenant("finance", Tier::Platinum);

    assert!(autoscaler.evaluate(&tenant, 100).await.approved);
    assert_eq!(autoscaler.replicas(&tenant), 10);

    let held = autoscaler.evaluate(&tenant, 200).await;
    assert!(!held.approved);
    assert_eq!(held.reason, "cooldown active");
    assert!(held.cooldown_remaining_secs > 0);
    assert_eq!(autoscaler.replicas(&tenant), 10);

    tokio::time::advance(Duration::from_secs(61)).await;
    let resumed = autoscaler.evaluate(&tenant, 200).await;
    assert!(resumed.approved);
    assert_eq!(autoscaler.replicas(&tenant), 20);
}

#[tokio::test]
async fn scale_events_record_before_and_after() {
    let (autoscaler, sink) = setup(100, platinum_policy(30));
    let tenant = tenant("finance", Tier::Platinum);

    autoscaler.evaluate(&tenant, 150).await;

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.before.as_ref().unwrap()["replicas"], 1);
    assert_eq!(record.after.as_ref().unwrap()["replicas"], 15);
}

#[tokio::test]
async fn steady_state_needs_no_change() {
    let (autoscaler, _) = setup(100, platinum_policy(30));
    let tenant = tenant("finance", Tier::Platinum);

    autoscaler.evaluate(&tenant, 100).await;
    let decision = autoscaler.evaluate(&tenant, 100).await;
    assert!(decision.approved);
    assert_eq!(decision.current, 10);
    assert_eq!(decision.proposed, 10);
}
