//! In-memory implementation of [`CounterStore`].
//!
//! Per-process fallback for the shared counter store: correctness is
//! per-replica only when this backs the rate enforcer.

use std::time::Duration;

use dashmap::DashMap;
use tessera_core::error::TesseraResult;
use tessera_core::repository::CounterStore;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    value: i64,
    expires_at: Instant,
}

/// Auto-expiring counters. The TTL is armed on the first increment of
/// a key; expired entries are reaped lazily on access.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, CounterEntry>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryCounterStore {
    async fn incr_with_ttl(&self, key: &str, amount: i64, ttl: Duration) -> TesseraResult<i64> {
        let now = Instant::now();
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert(CounterEntry {
                value: 0,
                expires_at: now + ttl,
            });
        if entry.expires_at <= now {
            // Previous window expired; this increment starts a new one.
            entry.value = 0;
            entry.expires_at = now + ttl;
        }
        entry.value += amount;
        Ok(entry.value)
    }

    async fn get(&self, key: &str) -> TesseraResult<Option<i64>> {
        let now = Instant::now();
        match self.counters.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value)),
            _ => Ok(None),
        }
    }
}
