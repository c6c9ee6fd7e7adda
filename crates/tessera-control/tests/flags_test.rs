//! Integration tests for hierarchical feature-flag evaluation.

use std::sync::Arc;
use std::time::Duration;

use tessera_control::flags::FlagService;
use tessera_core::error::TesseraError;
use tessera_core::models::flag::{FeatureFlag, FlagScope};
use tessera_core::models::tenant::{IsolationModel, Tenant, TenantStatus, Tier};
use tessera_core::repository::TenantStore;
use tessera_memstore::{MemoryFlagStore, MemoryTenantStore};

fn tenant(id: &str, tier: Tier) -> Tenant {
    let now = chrono::Utc::now();
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

async fn setup() -> FlagService<MemoryFlagStore, MemoryTenantStore> {
    let tenants = Arc::new(MemoryTenantStore::new());
    tenants.insert(tenant("marketing", Tier::Silver)).await.unwrap();
    tenants.insert(tenant("ops_silver", Tier::Silver)).await.unwrap();
    tenants
        .insert(tenant("finance_plat", Tier::Platinum))
        .await
        .unwrap();
    FlagService::new(
        Arc::new(MemoryFlagStore::new()),
        tenants,
        Duration::from_secs(60),
    )
}

fn flag(name: &str, scope: FlagScope, scope_id: Option<&str>, enabled: bool) -> FeatureFlag {
    FeatureFlag {
        feature_name: name.into(),
        scope,
        scope_id: scope_id.map(str::to_string),
        enabled,
    }
}

#[tokio::test]
async fn hierarchy_tenant_over_tier_over_global() {
    let svc = setup().await;
    svc.set_flag(flag("analytics", FlagScope::Global, None, false))
        .await
        .unwrap();
    svc.set_flag(flag("analytics", FlagScope::Tier, Some("platinum"), true))
        .await
        .unwrap();
    svc.set_flag(flag("analytics", FlagScope::Tenant, Some("marketing"), true))
        .await
        .unwrap();

    // Tenant override wins even for a silver tenant.
    assert!(svc.evaluate("marketing", "analytics").await);
    // Silver tier has no setting; global default applies.
    assert!(!svc.evaluate("ops_silver", "analytics").await);
    // Platinum tier default applies.
    assert!(svc.evaluate("finance_plat", "analytics").await);
    // Unknown flag for unknown tenant: false.
    assert!(!svc.evaluate("x", "unknown_flag").await);
}

#[tokio::test]
async fn missing_scope_id_rejected() {
    let svc = setup().await;
    for scope in [FlagScope::Tenant, FlagScope::Tier] {
        let err = svc
            .set_flag(flag("analytics", scope, None, true))
            .await
            .unwrap_err();
        assert!(matches!(err, TesseraError::InvalidArgument { .. }));
    }
    // Global must not carry one.
    let err = svc
        .set_flag(flag("analytics", FlagScope::Global, Some("x"), true))
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidArgument { .. }));
}

#[tokio::test]
async fn unknown_tier_scope_id_rejected() {
    let svc = setup().await;
    let err = svc
        .set_flag(flag("analytics", FlagScope::Tier, Some("diamond"), true))
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidArgument { .. }));
}

#[tokio::test]
async fn set_flag_invalidates_cached_value() {
    let svc = setup().await;
    svc.set_flag(flag("rerank", FlagScope::Global, None, false))
        .await
        .unwrap();
    assert!(!svc.evaluate("marketing", "rerank").await);

    // Within the cache TTL, a write must still be visible because the
    // write path invalidates per feature name.
    svc.set_flag(flag("rerank", FlagScope::Global, None, true))
        .await
        .unwrap();
    assert!(svc.evaluate("marketing", "rerank").await);
}

#[tokio::test]
async fn repeated_set_flag_is_idempotent() {
    let svc = setup().await;
    let f = flag("rerank", FlagScope::Tenant, Some("marketing"), true);
    svc.set_flag(f.clone()).await.unwrap();
    svc.set_flag(f).await.unwrap();

    let listed = svc.list_flags(Some(FlagScope::Tenant), None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(svc.evaluate("marketing", "rerank").await);
}

#[tokio::test]
async fn list_flags_by_scope() {
    let svc = setup().await;
    svc.set_flag(flag("a", FlagScope::Global, None, true))
        .await
        .unwrap();
    svc.set_flag(flag("b", FlagScope::Tier, Some("gold"), true))
        .await
        .unwrap();

    assert_eq!(svc.list_flags(None, None).await.unwrap().len(), 2);
    assert_eq!(
        svc.list_flags(Some(FlagScope::Global), None)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn concurrent_evaluations_settle_on_one_value() {
    let svc = Arc::new(setup().await);
    svc.set_flag(flag("hot", FlagScope::Global, None, true))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let svc = svc.clone();
        handles.push(tokio::spawn(
            async move { svc.evaluate("marketing", "hot").await },
        ));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }
}
