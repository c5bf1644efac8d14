//! Integration tests for Redis-backed cache locks.
//!
//! These need a live server; set `REDIS_URL` and run with `--ignored`.

use std::time::Duration;

use ttl_lock::{CacheBackend, CacheClient, Lease, LockStore, RedisCache};

mod common;

/// Helper to get Redis URL from environment or use default.
fn get_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

#[tokio::test]
#[ignore] // Requires Redis server running
async fn test_conformance() {
    let cache = RedisCache::new(&get_redis_url()).await.unwrap();
    let stores = |name: &str, lease: Lease, owner: &str| {
        LockStore::new(CacheBackend::new(cache.clone()), name, lease, Some(owner)).unwrap()
    };
    common::conformance(&stores, &common::unique_name("redis")).await;
}

#[tokio::test]
#[ignore] // Requires Redis server running
async fn test_job_42() {
    let cache = RedisCache::new(&get_redis_url()).await.unwrap();
    let stores = |name: &str, lease: Lease, owner: &str| {
        LockStore::new(CacheBackend::new(cache.clone()), name, lease, Some(owner)).unwrap()
    };
    common::job_42(&stores, &common::unique_name("job-42")).await;
}

#[tokio::test]
#[ignore] // Requires Redis server running
async fn test_client_primitives() {
    let cache = RedisCache::new(&get_redis_url()).await.unwrap();
    let key = common::unique_name("primitive");

    assert!(cache.add(&key, "a", Some(Duration::from_secs(10))).await.unwrap());
    assert!(!cache.add(&key, "b", None).await.unwrap());
    assert!(!cache.compare_and_swap(&key, "b", "c", None).await.unwrap());
    assert!(cache.compare_and_swap(&key, "a", "c", Some(Duration::from_secs(10))).await.unwrap());
    assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("c"));
    assert!(!cache.compare_and_delete(&key, "a").await.unwrap());
    assert!(cache.compare_and_delete(&key, "c").await.unwrap());
    assert!(!cache.delete(&key).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires Redis server running
async fn test_invalid_url_is_rejected() {
    assert!(RedisCache::new("not-a-url").await.is_err());
}
