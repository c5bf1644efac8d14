//! Integration tests for cache-entry locks over the in-process cache.

use std::time::Duration;

use ttl_lock::{CacheBackend, CacheClient, Lease, LockFactory, LockStore, MemoryCache};

mod common;

type CacheStore = LockStore<CacheBackend<MemoryCache>>;

fn stores(cache: &MemoryCache) -> impl Fn(&str, Lease, &str) -> CacheStore + '_ {
    move |name: &str, lease: Lease, owner: &str| {
        LockStore::new(CacheBackend::new(cache.clone()), name, lease, Some(owner)).unwrap()
    }
}

#[tokio::test]
async fn test_conformance() {
    let cache = MemoryCache::new();
    common::conformance(&stores(&cache), "cache").await;
}

#[tokio::test]
async fn test_job_42() {
    let cache = MemoryCache::new();
    common::job_42(&stores(&cache), "job-42").await;
}

#[tokio::test]
async fn test_entry_carries_native_ttl() {
    let cache = MemoryCache::new();
    let lock = LockFactory::default()
        .create_cache_lock(
            cache.clone(),
            "short",
            Lease::For(Duration::from_millis(100)),
            Some("A"),
        )
        .unwrap();

    assert!(lock.acquire().await);
    assert!(cache.get("ttl-lock:short").await.unwrap().is_some());

    // lease plus the one second safety margin
    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert_eq!(cache.get("ttl-lock:short").await.unwrap(), None);
}

#[tokio::test]
async fn test_prefixes_separate_namespaces() {
    let cache = MemoryCache::new();
    let a = LockStore::new(
        CacheBackend::new(cache.clone()).with_prefix("app-a:"),
        "job",
        Lease::Default,
        Some("A"),
    )
    .unwrap();
    let b = LockStore::new(
        CacheBackend::new(cache.clone()).with_prefix("app-b:"),
        "job",
        Lease::Default,
        Some("B"),
    )
    .unwrap();

    assert!(a.acquire().await);
    assert!(b.acquire().await);
}

#[tokio::test]
async fn test_concurrent_acquirers_get_one_winner() {
    let cache = MemoryCache::new();
    let mut tasks = Vec::new();
    for i in 0..16 {
        let backend = CacheBackend::new(cache.clone());
        tasks.push(tokio::spawn(async move {
            let owner = format!("w{i}");
            let lock = LockStore::new(backend, "contended", Lease::Default, Some(&owner)).unwrap();
            lock.acquire().await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}
