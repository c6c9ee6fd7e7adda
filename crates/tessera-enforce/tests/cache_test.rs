//! Integration tests for the tenant-scoped cache facade.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tessera_control::audit::AuditTrail;
use tessera_core::context::{self, RequestContext};
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::tenant::{IsolationModel, Tenant, TenantStatus, Tier};
use tessera_core::repository::{CacheStore, ScanPage, TenantStore};
use tessera_enforce::cache::{CacheConfig, TenantCache};
use tessera_memstore::{MemoryAuditSink, MemoryCacheStore, MemoryTenantStore};

fn tenant(id: &str, tier: Tier, cache_quota_gb: f64) -> Tenant {
    let now = Utc::now();
    let mut quotas = tier.default_quotas();
    quotas.cache_quota_gb = cache_quota_gb;
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
        quotas,
        health_score: 100,
        metadata: serde_json::json!({}),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

async fn setup(
    config: CacheConfig,
) -> TenantCache<MemoryCacheStore, MemoryTenantStore, MemoryAuditSink> {
    let tenants = Arc::new(MemoryTenantStore::new());
    tenants
        .insert(tenant("finance", Tier::Silver, 20.0))
        .await
        .unwrap();
    tenants
        .insert(tenant("legal", Tier::Platinum, 500.0))
        .await
        .unwrap();
    TenantCache::new(
        Arc::new(MemoryCacheStore::new()),
        tenants,
        AuditTrail::new(Arc::new(MemoryAuditSink::new())),
        config,
    )
}

/// Cache store that is always down.
struct DownCacheStore;

impl CacheStore for DownCacheStore {
    async fn get(&self, _key: &str) -> TesseraResult<Option<Vec<u8>>> {
        Err(TesseraError::Unavailable {
            reason: "cache store down".into(),
        })
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> TesseraResult<()> {
        Err(TesseraError::Unavailable {
            reason: "cache store down".into(),
        })
    }

    async fn delete(&self, _key: &str) -> TesseraResult<bool> {
        Err(TesseraError::Unavailable {
            reason: "cache store down".into(),
        })
    }

    async fn scan(
        &self,
        _prefix: &str,
        _cursor: Option<&str>,
        _limit: usize,
    ) -> TesseraResult<ScanPage> {
        Err(TesseraError::Unavailable {
            reason: "cache store down".into(),
        })
    }
}

#[tokio::test]
async fn namespaces_isolate_tenants() {
    let cache = Arc::new(setup(CacheConfig::default()).await);

    let finance = cache.clone();
    context::scope(RequestContext::new("finance"), async move {
        assert!(finance.set("answer", b"finance-data".to_vec(), None).await.unwrap());
    })
    .await;

    let legal = cache.clone();
    context::scope(RequestContext::new("legal"), async move {
        // Same logical key, different namespace.
        assert_eq!(legal.get("answer").await.unwrap(), None);
        assert!(legal.set("answer", b"legal-data".to_vec(), None).await.unwrap());
        assert_eq!(
            legal.get("answer").await.unwrap(),
            Some(b"legal-data".to_vec())
        );
    })
    .await;

    context::scope(RequestContext::new("finance"), async move {
        assert_eq!(
            cache.get("answer").await.unwrap(),
            Some(b"finance-data".to_vec())
        );
    })
    .await;
}

#[tokio::test]
async fn operations_require_ambient_context() {
    let cache = setup(CacheConfig::default()).await;
    assert!(matches!(
        cache.get("answer").await,
        Err(TesseraError::NoTenantContext)
    ));
    assert!(matches!(
        cache.set("answer", vec![1], None).await,
        Err(TesseraError::NoTenantContext)
    ));
    assert!(matches!(
        cache.invalidate_tenant().await,
        Err(TesseraError::NoTenantContext)
    ));
}

#[tokio::test(start_paused = true)]
async fn default_ttl_follows_tier() {
    let cache = Arc::new(setup(CacheConfig::default()).await);

    let c = cache.clone();
    context::scope(RequestContext::new("finance"), async move {
        c.set("k", vec![1], None).await.unwrap();
    })
    .await;
    let c = cache.clone();
    context::scope(RequestContext::new("legal"), async move {
        c.set("k", vec![2], None).await.unwrap();
    })
    .await;

    // Past silver's 900 s but within platinum's 3600 s.
    tokio::time::advance(Duration::from_secs(901)).await;

    let c = cache.clone();
    context::scope(RequestContext::new("finance"), async move {
        assert_eq!(c.get("k").await.unwrap(), None);
    })
    .await;
    context::scope(RequestContext::new("legal"), async move {
        assert_eq!(cache.get("k").await.unwrap(), Some(vec![2]));
    })
    .await;
}

#[tokio::test]
async fn invalidation_is_scoped_to_one_namespace() {
    let cache = Arc::new(setup(CacheConfig::default()).await);

    let c = cache.clone();
    context::scope(RequestContext::new("finance"), async move {
        for i in 0..10 {
            c.set(&format!("k{i}"), vec![i], None).await.unwrap();
        }
    })
    .await;
    let c = cache.clone();
    context::scope(RequestContext::new("legal"), async move {
        c.set("k0", vec![9], None).await.unwrap();
    })
    .await;

    let c = cache.clone();
    let removed = context::scope(RequestContext::new("finance"), async move {
        c.invalidate_tenant().await.unwrap()
    })
    .await;
    assert_eq!(removed, 10);

    let c = cache.clone();
    context::scope(RequestContext::new("finance"), async move {
        assert_eq!(c.get("k0").await.unwrap(), None);
    })
    .await;
    context::scope(RequestContext::new("legal"), async move {
        assert_eq!(cache.get("k0").await.unwrap(), Some(vec![9]));
    })
    .await;
}

#[tokio::test]
async fn size_sums_namespace_bytes() {
    let cache = Arc::new(setup(CacheConfig::default()).await);

    let c = cache.clone();
    let size = context::scope(RequestContext::new("finance"), async move {
        c.set("a", vec![0; 100], None).await.unwrap();
        c.set("b", vec![0; 150], None).await.unwrap();
        c.size().await.unwrap()
    })
    .await;
    assert_eq!(size, 250);
    assert_eq!(cache.size_for("legal").await, 0);
}

#[tokio::test]
async fn over_quota_write_continues_by_default() {
    // Quota of 1e-6 GB = 1000 bytes.
    let tenants = Arc::new(MemoryTenantStore::new());
    tenants
        .insert(tenant("finance", Tier::Bronze, 1e-6))
        .await
        .unwrap();
    let cache = TenantCache::new(
        Arc::new(MemoryCacheStore::new()),
        tenants,
        AuditTrail::new(Arc::new(MemoryAuditSink::new())),
        CacheConfig::default(),
    );

    context::scope(RequestContext::new("finance"), async move {
        assert!(cache.set("a", vec![0; 600], None).await.unwrap());
        // Over quota now, but the default policy is warn-and-continue.
        assert!(cache.set("b", vec![0; 600], None).await.unwrap());
        assert!(cache.get("b").await.unwrap().is_some());
    })
    .await;
}

#[tokio::test]
async fn over_quota_write_rejected_when_configured() {
    let tenants = Arc::new(MemoryTenantStore::new());
    tenants
        .insert(tenant("finance", Tier::Bronze, 1e-6))
        .await
        .unwrap();
    let sink = Arc::new(MemoryAuditSink::new());
    let cache = TenantCache::new(
        Arc::new(MemoryCacheStore::new()),
        tenants,
        AuditTrail::new(sink.clone()),
        CacheConfig {
            reject_over_quota: true,
            ..Default::default()
        },
    );

    context::scope(RequestContext::new("finance"), async move {
        assert!(cache.set("a", vec![0; 600], None).await.unwrap());
        assert!(!cache.set("b", vec![0; 600], None).await.unwrap());
        assert!(cache.get("b").await.unwrap().is_none());
    })
    .await;

    let records = sink.records();
    assert!(
        records
            .iter()
            .any(|r| r.operation == "cache_set"
                && r.error_kind.as_deref() == Some("resource_exhausted"))
    );
}

#[tokio::test]
async fn store_outage_degrades_to_miss() {
    let tenants = Arc::new(MemoryTenantStore::new());
    tenants
        .insert(tenant("finance", Tier::Gold, 100.0))
        .await
        .unwrap();
    let sink = Arc::new(MemoryAuditSink::new());
    let cache = TenantCache::new(
        Arc::new(DownCacheStore),
        tenants,
        AuditTrail::new(sink.clone()),
        CacheConfig::default(),
    );

    context::scope(RequestContext::new("finance"), async move {
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.set("k", vec![1], None).await.unwrap());
        assert!(!cache.delete("k").await.unwrap());
        assert_eq!(cache.invalidate_for("finance").await, 0);
    })
    .await;

    let operations: Vec<_> = sink.records().iter().map(|r| r.operation.clone()).collect();
    assert!(operations.contains(&"cache_get".to_string()));
    assert!(operations.contains(&"cache_set".to_string()));
}
