//! Store and adapter trait definitions.
//!
//! All store operations are async. Implementations must be
//! linearizable per key with respect to successful writes; the
//! in-memory implementations live in `tessera-memstore`. Service
//! layers are generic over these traits so they carry no dependency on
//! any concrete store.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TesseraResult;
use crate::models::audit::AuditRecord;
use crate::models::certificate::DeletionReceipt;
use crate::models::flag::{FeatureFlag, FlagScope};
use crate::models::tenant::{Tenant, TenantFilter};
use crate::models::usage::{BillingPeriod, UsageDelta, UsageMeter};

/// Authoritative tenant record store. Visibility rules (soft-delete
/// hiding) are applied by the registry service, not here.
pub trait TenantStore: Send + Sync {
    /// Insert a new tenant; `AlreadyExists` when the id is taken.
    fn insert(&self, tenant: Tenant) -> impl Future<Output = TesseraResult<()>> + Send;

    /// Fetch a tenant by id, including soft-deleted records.
    fn get(&self, tenant_id: &str) -> impl Future<Output = TesseraResult<Tenant>> + Send;

    /// List tenants matching the filter, ordered by tenant id.
    fn list(&self, filter: &TenantFilter)
    -> impl Future<Output = TesseraResult<Vec<Tenant>>> + Send;

    /// Replace an existing tenant record; `NotFound` when absent.
    fn update(&self, tenant: Tenant) -> impl Future<Output = TesseraResult<()>> + Send;

    /// Physically remove the record.
    fn remove(&self, tenant_id: &str) -> impl Future<Output = TesseraResult<()>> + Send;
}

/// Feature-flag store, unique on `(feature_name, scope, scope_id)`.
pub trait FlagStore: Send + Sync {
    fn upsert(&self, flag: FeatureFlag) -> impl Future<Output = TesseraResult<()>> + Send;

    fn get(
        &self,
        feature_name: &str,
        scope: FlagScope,
        scope_id: Option<&str>,
    ) -> impl Future<Output = TesseraResult<Option<FeatureFlag>>> + Send;

    fn list(
        &self,
        scope: Option<FlagScope>,
        scope_id: Option<&str>,
    ) -> impl Future<Output = TesseraResult<Vec<FeatureFlag>>> + Send;
}

/// Append-only audit sink.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: AuditRecord) -> impl Future<Output = TesseraResult<()>> + Send;

    /// All records for a tenant, oldest first.
    fn for_tenant(
        &self,
        tenant_id: &str,
    ) -> impl Future<Output = TesseraResult<Vec<AuditRecord>>> + Send;

    /// Redact payloads of a tenant's records where erasure is
    /// infeasible; the operation trail itself is retained.
    fn anonymize_tenant(&self, tenant_id: &str)
    -> impl Future<Output = TesseraResult<usize>> + Send;
}

/// Shared counter store used by the rate enforcer. `incr_with_ttl`
/// adds `amount` atomically and returns the new total; the TTL applies
/// from the first increment of a key.
pub trait CounterStore: Send + Sync {
    fn incr_with_ttl(
        &self,
        key: &str,
        amount: i64,
        ttl: Duration,
    ) -> impl Future<Output = TesseraResult<i64>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = TesseraResult<Option<i64>>> + Send;
}

/// One page of a cursored key scan.
#[derive(Debug, Clone)]
pub struct ScanPage {
    pub keys: Vec<String>,
    /// Pass back to continue the scan; `None` when exhausted.
    pub next_cursor: Option<String>,
}

/// Tenant-agnostic KV cache store. Namespacing is the facade's job
/// (`tessera-enforce::cache`); implementations never interpret keys.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = TesseraResult<Option<Vec<u8>>>> + Send;

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> impl Future<Output = TesseraResult<()>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = TesseraResult<bool>> + Send;

    /// Cursored scan of keys under a prefix. Never a global lock.
    fn scan(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> impl Future<Output = TesseraResult<ScanPage>> + Send;
}

/// Per-tenant usage accumulators, bucketed by billing period.
pub trait UsageStore: Send + Sync {
    fn apply(
        &self,
        tenant_id: &str,
        period: BillingPeriod,
        delta: UsageDelta,
    ) -> impl Future<Output = TesseraResult<()>> + Send;

    fn get(
        &self,
        tenant_id: &str,
        period: BillingPeriod,
    ) -> impl Future<Output = TesseraResult<Option<UsageMeter>>> + Send;

    /// All meters for one tenant, oldest period first.
    fn history(&self, tenant_id: &str)
    -> impl Future<Output = TesseraResult<Vec<UsageMeter>>> + Send;

    /// All meters for one period across tenants.
    fn all_for_period(
        &self,
        period: BillingPeriod,
    ) -> impl Future<Output = TesseraResult<Vec<UsageMeter>>> + Send;
}

/// Narrow contract every dependent subsystem exposes to the cascading
/// operator. Object-safe: the operator holds a `Vec<Arc<dyn
/// SubsystemAdapter>>` in fixed order.
///
/// Every call must be idempotent by `(tenant_id, action)` — the
/// operator and the background reconciler may both drive the same
/// transition.
#[async_trait]
pub trait SubsystemAdapter: Send + Sync {
    /// Stable adapter name used in audit records and certificates.
    fn name(&self) -> &'static str;

    async fn on_provision(&self, tenant: &Tenant) -> TesseraResult<()>;

    async fn on_suspend(&self, tenant_id: &str) -> TesseraResult<()>;

    async fn on_activate(&self, tenant_id: &str) -> TesseraResult<()>;

    async fn on_delete(&self, tenant_id: &str) -> TesseraResult<DeletionReceipt>;

    async fn verify_deleted(&self, tenant_id: &str) -> TesseraResult<bool>;
}
