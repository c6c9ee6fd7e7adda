//! In-memory implementation of [`CacheStore`].

use std::time::Duration;

use dashmap::DashMap;
use tessera_core::error::TesseraResult;
use tessera_core::repository::{CacheStore, ScanPage};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// TTL-aware KV store. Expired entries are evicted lazily on read and
/// skipped by scans.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> TesseraResult<Option<Vec<u8>>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        } else {
            return Ok(None);
        }
        self.entries.remove_if(key, |_, entry| entry.expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> TesseraResult<()> {
        let entry = CacheEntry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> TesseraResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn scan(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> TesseraResult<ScanPage> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && !entry.value().expired(now))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();

        let start = match cursor {
            Some(cursor) => keys.partition_point(|k| k.as_str() <= cursor),
            None => 0,
        };
        let page: Vec<String> = keys[start..].iter().take(limit).cloned().collect();
        let next_cursor = if start + page.len() < keys.len() {
            page.last().cloned()
        } else {
            None
        };
        Ok(ScanPage {
            keys: page,
            next_cursor,
        })
    }
}
