//! Example: Using Redis-backed cache locks
//!
//! Run with: `cargo run --example redis_lock`
//!
//! Requires a Redis server. Set REDIS_URL environment variable
//! or modify the URL below.

use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use ttl_lock::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let redis_url = std::env::var("REDIS_URL")
        .unwrap_or_else(|_| "redis://localhost:6379".to_string());

    println!("Connecting to Redis...");
    let cache = RedisCache::new(&redis_url).await?;
    let factory = LockFactory::default();

    let lease = Lease::For(Duration::from_secs(10));
    let lock = factory.create_cache_lock(cache.clone(), "example-resource", lease, None)?;
    println!("Acquiring lock with 5 second budget...");
    lock.block(Duration::from_secs(5)).await?;
    println!("Lock acquired, {:?} left", lock.remaining_lifetime().await);

    // A second owner gives up when asked to
    let rival = factory.create_cache_lock(cache, "example-resource", Lease::Default, None)?;
    let (cancel, cancelled) = watch::channel(false);
    let waiter = tokio::spawn(async move {
        rival
            .block_cancellable(Duration::from_secs(30), cancelled)
            .await
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    let _ = cancel.send(true);
    println!("Rival gave up: {:?}", waiter.await?);

    lock.release().await;
    println!("Lock released");

    Ok(())
}
