//! Per-tenant bounded work queues.
//!
//! Queues are strictly per-tenant, so one tenant's backlog can never
//! starve another at the queue layer; scheduling across tenants is the
//! worker pool's concern. Ordering within a tenant is FIFO. A full
//! queue signals backpressure by returning `false` from `enqueue`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tessera_control::audit::AuditTrail;
use tessera_core::models::audit::{AuditOutcome, AuditRecord};
use tessera_core::repository::AuditSink;
use tokio::sync::Notify;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

struct TenantQueue<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
}

pub struct TenantQueueManager<T, A> {
    queues: DashMap<String, Arc<TenantQueue<T>>>,
    capacity: usize,
    audit: AuditTrail<A>,
}

impl<T: Send + 'static, A: AuditSink> TenantQueueManager<T, A> {
    pub fn new(capacity: usize, audit: AuditTrail<A>) -> Self {
        Self {
            queues: DashMap::new(),
            capacity,
            audit,
        }
    }

    fn queue(&self, tenant_id: &str) -> Arc<TenantQueue<T>> {
        self.queues
            .entry(tenant_id.to_string())
            .or_insert_with(|| {
                Arc::new(TenantQueue {
                    items: Mutex::new(VecDeque::new()),
                    notify: Notify::new(),
                })
            })
            .clone()
    }

    /// `false` signals backpressure: the tenant's queue is at
    /// capacity and the item was not accepted.
    pub fn enqueue(&self, tenant_id: &str, item: T) -> bool {
        let queue = self.queue(tenant_id);
        {
            let mut items = queue.items.lock();
            if items.len() >= self.capacity {
                return false;
            }
            items.push_back(item);
        }
        queue.notify.notify_one();
        true
    }

    /// Pop the oldest item, waiting up to `timeout` for one to arrive.
    pub async fn dequeue(&self, tenant_id: &str, timeout: Duration) -> Option<T> {
        let queue = self.queue(tenant_id);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(item) = queue.items.lock().pop_front() {
                return Some(item);
            }
            if tokio::time::timeout_at(deadline, queue.notify.notified())
                .await
                .is_err()
            {
                return queue.items.lock().pop_front();
            }
        }
    }

    pub fn depth(&self, tenant_id: &str) -> usize {
        self.queues
            .get(tenant_id)
            .map(|q| q.items.lock().len())
            .unwrap_or(0)
    }

    /// Depth gauge per tenant, consumed by the autoscaler and metrics
    /// scrapes.
    pub fn depth_all(&self) -> BTreeMap<String, usize> {
        self.queues
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().items.lock().len()))
            .collect()
    }

    /// Drop a tenant's pending work, auditing the interruption. Used
    /// on suspension and at shutdown.
    pub async fn drain_tenant(&self, tenant_id: &str, actor: &str) -> usize {
        let Some(queue) = self.queues.get(tenant_id).map(|q| Arc::clone(&q)) else {
            return 0;
        };
        let dropped = {
            let mut items = queue.items.lock();
            let n = items.len();
            items.clear();
            n
        };
        if dropped > 0 {
            self.audit
                .record(
                    AuditRecord::new(tenant_id, "queue_drain", actor, AuditOutcome::Interrupted)
                        .with_after(serde_json::json!({ "dropped": dropped })),
                )
                .await;
        }
        dropped
    }

    /// Shutdown drain across every tenant; returns the total number of
    /// abandoned items.
    pub async fn drain_all(&self, actor: &str) -> usize {
        let tenant_ids: Vec<String> = self.queues.iter().map(|e| e.key().clone()).collect();
        let mut total = 0;
        for tenant_id in tenant_ids {
            total += self.drain_tenant(&tenant_id, actor).await;
        }
        total
    }
}
