//! TTL behavior of the counter and cache stores, driven with paused
//! tokio time.

use std::time::Duration;

use tessera_core::repository::{CacheStore, CounterStore};
use tessera_memstore::{MemoryCacheStore, MemoryCounterStore};

#[tokio::test(start_paused = true)]
async fn counter_increments_within_window() {
    let store = MemoryCounterStore::new();
    for expected in 1..=5 {
        let value = store
            .incr_with_ttl("rate:finance:100", 1, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(value, expected);
    }
    assert_eq!(store.get("rate:finance:100").await.unwrap(), Some(5));
}

#[tokio::test(start_paused = true)]
async fn counter_expires_after_ttl() {
    let store = MemoryCounterStore::new();
    store
        .incr_with_ttl("rate:finance:100", 1, Duration::from_secs(60))
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(store.get("rate:finance:100").await.unwrap(), None);

    // A new increment starts a fresh window at 1.
    let value = store
        .incr_with_ttl("rate:finance:100", 1, Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(value, 1);
}

#[tokio::test(start_paused = true)]
async fn counter_accumulates_multi_unit_increments() {
    let store = MemoryCounterStore::new();
    store
        .incr_with_ttl("quota:finance:documents:0", 4, Duration::from_secs(60))
        .await
        .unwrap();
    let value = store
        .incr_with_ttl("quota:finance:documents:0", 3, Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(value, 7);
}

#[tokio::test(start_paused = true)]
async fn counter_keys_are_independent() {
    let store = MemoryCounterStore::new();
    store
        .incr_with_ttl("rate:finance:100", 1, Duration::from_secs(60))
        .await
        .unwrap();
    store
        .incr_with_ttl("rate:legal:100", 1, Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(store.get("rate:finance:100").await.unwrap(), Some(1));
    assert_eq!(store.get("rate:legal:100").await.unwrap(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn cache_ttl_and_unbounded_entries() {
    let store = MemoryCacheStore::new();
    store
        .set("cache:finance:a", b"v1".to_vec(), Some(Duration::from_secs(10)))
        .await
        .unwrap();
    store.set("cache:finance:b", b"v2".to_vec(), None).await.unwrap();

    tokio::time::advance(Duration::from_secs(11)).await;

    assert_eq!(store.get("cache:finance:a").await.unwrap(), None);
    assert_eq!(
        store.get("cache:finance:b").await.unwrap(),
        Some(b"v2".to_vec())
    );
}

#[tokio::test]
async fn cache_delete_reports_presence() {
    let store = MemoryCacheStore::new();
    store.set("k", b"v".to_vec(), None).await.unwrap();
    assert!(store.delete("k").await.unwrap());
    assert!(!store.delete("k").await.unwrap());
}

#[tokio::test]
async fn scan_pages_through_prefix_with_cursor() {
    let store = MemoryCacheStore::new();
    for i in 0..7 {
        store
            .set(&format!("cache:finance:k{i}"), vec![i], None)
            .await
            .unwrap();
    }
    store.set("cache:legal:k0", b"x".to_vec(), None).await.unwrap();

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store
            .scan("cache:finance:", cursor.as_deref(), 3)
            .await
            .unwrap();
        seen.extend(page.keys);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(seen.len(), 7);
    assert!(seen.iter().all(|k| k.starts_with("cache:finance:")));
    // Sorted, no duplicates.
    let mut sorted = seen.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(seen, sorted);
}
