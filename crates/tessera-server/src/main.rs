//! Tessera control-plane server.
//!
//! Single-process composition root over the in-memory stores: wires
//! the registry, cascade operator, and enforcement services together,
//! runs the background loops, and shuts them down cleanly on SIGINT.
//! The external API surface is not part of this binary; request-driven
//! services with no background loop (`FlagService`, `LifecycleManager`,
//! `DeletionWorkflow`, `StorageGuard`, and the `flag_cache_ttl_secs` /
//! `deletion_sla_days` knobs that configure them) are constructed by
//! the API layer when it attaches.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tessera_billing::{BillingConfig, CostEngine};
use tessera_control::locks::TenantLocks;
use tessera_control::{
    AuditTrail, CascadeOperator, ControlConfig, LifecycleEvent, LifecycleEvents, TenantRegistry,
};
use tessera_core::error::TesseraResult;
use tessera_core::health::HealthSignals;
use tessera_core::models::certificate::DeletionReceipt;
use tessera_core::models::tenant::{Tenant, TenantStatus};
use tessera_core::models::usage::BillingPeriod;
use tessera_core::repository::SubsystemAdapter;
use tessera_enforce::queue::DEFAULT_QUEUE_CAPACITY;
use tessera_enforce::{
    AutoscalePolicy, BlastConfig, BlastRadiusDetector, CacheConfig, NeighborConfig,
    NoisyNeighborController, RateEnforcer, SignalSource, TenantCache, TenantQueueManager,
    ThrottleState,
};
use tessera_memstore::{
    MemoryAuditSink, MemoryCacheStore, MemoryCounterStore, MemoryTenantStore, MemoryUsageStore,
    RecordingAdapter,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CLUSTER_CAPACITY: u32 = 256;
const AUTOSCALE_INTERVAL: Duration = Duration::from_secs(30);
const BILLING_REPORT_INTERVAL: Duration = Duration::from_secs(3600);

type ServerCache = TenantCache<MemoryCacheStore, MemoryTenantStore, MemoryAuditSink>;

/// Bridges tenant lifecycle into the cache namespace: suspension and
/// deletion both clear the tenant's entries.
struct CacheAdapter {
    cache: Arc<ServerCache>,
}

#[async_trait]
impl SubsystemAdapter for CacheAdapter {
    fn name(&self) -> &'static str {
        "cache-store"
    }

    async fn on_provision(&self, _tenant: &Tenant) -> TesseraResult<()> {
        Ok(())
    }

    async fn on_suspend(&self, tenant_id: &str) -> TesseraResult<()> {
        let removed = self.cache.invalidate_for(tenant_id).await;
        info!(%tenant_id, removed, "cache cleared on suspension");
        Ok(())
    }

    async fn on_activate(&self, _tenant_id: &str) -> TesseraResult<()> {
        Ok(())
    }

    async fn on_delete(&self, tenant_id: &str) -> TesseraResult<DeletionReceipt> {
        self.cache.invalidate_for(tenant_id).await;
        Ok(DeletionReceipt {
            system: self.name().to_string(),
            deleted_at: Utc::now(),
            residual: false,
        })
    }

    async fn verify_deleted(&self, tenant_id: &str) -> TesseraResult<bool> {
        Ok(self.cache.size_for(tenant_id).await == 0)
    }
}

/// Signal source for the single-process build. No data-plane reporter
/// is attached yet, so every tenant samples as quiet.
struct QuietTelemetry;

impl SignalSource for QuietTelemetry {
    async fn sample(&self, _tenant_id: &str) -> TesseraResult<HealthSignals> {
        Ok(HealthSignals {
            latency_p95_ms: 0.0,
            error_rate: 0.0,
            query_success_rate: 1.0,
            storage_utilization: 0.0,
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("tessera=info".parse().unwrap()),
        )
        .json()
        .init();
    info!("tessera control plane starting");

    let config = ControlConfig::default();

    let tenants = Arc::new(MemoryTenantStore::new());
    let usage = Arc::new(MemoryUsageStore::new());
    let counters = Arc::new(MemoryCounterStore::new());
    let cache_store = Arc::new(MemoryCacheStore::new());
    let sink = Arc::new(MemoryAuditSink::new());

    let audit = AuditTrail::new(Arc::clone(&sink));
    let locks = Arc::new(TenantLocks::new());
    let events = LifecycleEvents::new(config.event_buffer);

    let registry = TenantRegistry::new(
        Arc::clone(&tenants),
        Arc::clone(&usage),
        audit.clone(),
        events.clone(),
        Arc::clone(&locks),
    );

    let cache = Arc::new(TenantCache::new(
        Arc::clone(&cache_store),
        Arc::clone(&tenants),
        audit.clone(),
        CacheConfig::default(),
    ));

    let adapters: Vec<Arc<dyn SubsystemAdapter>> = vec![
        Arc::new(RecordingAdapter::new("relational-store")),
        Arc::new(RecordingAdapter::new("vector-store")),
        Arc::new(RecordingAdapter::new("object-store")),
        Arc::new(CacheAdapter {
            cache: Arc::clone(&cache),
        }),
        Arc::new(RecordingAdapter::new("monitoring")),
    ];
    let operator = Arc::new(CascadeOperator::new(
        adapters,
        audit.clone(),
        Duration::from_secs(config.adapter_timeout_secs),
    ));

    let throttle = Arc::new(ThrottleState::new());
    let rates = Arc::new(RateEnforcer::new(
        Arc::clone(&counters),
        audit.clone(),
        Arc::clone(&throttle),
    ));
    let neighbor = Arc::new(NoisyNeighborController::new(
        Arc::clone(&throttle),
        audit.clone(),
        NeighborConfig::default(),
    ));
    let queues: Arc<TenantQueueManager<String, MemoryAuditSink>> = Arc::new(
        TenantQueueManager::new(DEFAULT_QUEUE_CAPACITY, audit.clone()),
    );
    let autoscaler = Arc::new(AutoscalePolicy::new(CLUSTER_CAPACITY, audit.clone()));
    let detector = Arc::new(BlastRadiusDetector::new(
        Arc::clone(&neighbor),
        audit.clone(),
        BlastConfig::default(),
    ));
    let billing = CostEngine::new(Arc::clone(&usage), BillingConfig::default());

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();
    tasks.push(Arc::clone(&operator).spawn_subscriber(&events, cancel.clone()));
    tasks.push(Arc::clone(&neighbor).spawn(rates, Arc::clone(&tenants), cancel.clone()));
    tasks.push(Arc::clone(&autoscaler).spawn(
        Arc::clone(&tenants),
        Arc::clone(&queues),
        AUTOSCALE_INTERVAL,
        cancel.clone(),
    ));
    tasks.push(detector.spawn(
        Arc::clone(&tenants),
        Arc::new(QuietTelemetry),
        cancel.clone(),
    ));
    tasks.push(spawn_lifecycle_janitor(
        events.subscribe(),
        Arc::clone(&queues),
        Arc::clone(&neighbor),
        cancel.clone(),
    ));
    tasks.push(spawn_billing_report(billing, cancel.clone()));

    match registry.stats().await {
        Ok(stats) => info!(tenants = stats.total, "registry loaded"),
        Err(err) => error!(error = %err, "registry stats unavailable"),
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
    info!("shutdown requested");
    cancel.cancel();
    for task in tasks {
        if let Err(err) = task.await {
            error!(error = %err, "background task panicked");
        }
    }
    let dropped = queues.drain_all("shutdown").await;
    info!(dropped, "tessera control plane stopped");
}

/// Reacts to lifecycle transitions the cascade adapters do not cover:
/// suspension drains the tenant's work queue, reactivation lifts any
/// standing rate mitigation.
fn spawn_lifecycle_janitor(
    mut rx: broadcast::Receiver<LifecycleEvent>,
    queues: Arc<TenantQueueManager<String, MemoryAuditSink>>,
    neighbor: Arc<NoisyNeighborController<MemoryAuditSink>>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(LifecycleEvent::Transitioned {
                        tenant_id,
                        to: TenantStatus::Suspended,
                        ..
                    }) => {
                        let dropped = queues.drain_tenant(&tenant_id, "lifecycle").await;
                        info!(%tenant_id, dropped, "suspended tenant queue drained");
                    }
                    Ok(LifecycleEvent::Transitioned {
                        tenant_id,
                        to: TenantStatus::Active,
                        ..
                    }) => {
                        if neighbor.restore(&tenant_id) {
                            info!(%tenant_id, "mitigation lifted on reactivation");
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "lifecycle janitor lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}

/// Hourly platform chargeback summary for the current billing period.
fn spawn_billing_report(
    billing: CostEngine<MemoryUsageStore>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(BILLING_REPORT_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match billing.platform_summary(BillingPeriod::current()).await {
                        Ok(summary) => info!(
                            tenants = summary.tenant_count,
                            total_final = summary.total_final,
                            "platform chargeback summary"
                        ),
                        Err(err) => warn!(error = %err, "platform chargeback summary failed"),
                    }
                }
            }
        }
    })
}
