//! Example: Using file-based TTL locks
//!
//! Run with: `cargo run --example file_lock`
//!
//! Set `RUST_LOG=ttl_lock_core=debug` to watch the lock transitions.

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use ttl_lock::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let factory = LockFactory::new(std::env::temp_dir().join("ttl-locks"));
    let lease = Lease::For(Duration::from_secs(10));
    let lock = factory.create_file_lock("example-resource", lease, None)?;
    println!("Created lock {} owned by {}", lock.name(), lock.owner());

    // Try once, without waiting
    if lock.acquire().await {
        println!("Lock acquired, {:?} left", lock.remaining_lifetime().await);

        tokio::time::sleep(Duration::from_secs(2)).await;
        println!("Work completed");

        lock.release().await;
        println!("Lock released");
    } else {
        println!("Lock is currently held by another process");
    }

    // Wait up to five seconds; the lock is released when the closure returns
    println!("\nRunning a job under the lock (5 second budget)...");
    let processed = lock
        .block_with(Duration::from_secs(5), || async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            42
        })
        .await?;
    println!("Processed {processed} items, lock released");

    // Locking a specific file through a sibling `.lock` marker
    let report = std::env::temp_dir().join("report.csv");
    let marker = factory.create_marker_lock(&report, Lease::Default, None)?;
    if marker.acquire().await {
        println!("\n{} is ours for {:?}", report.display(), marker.remaining_lifetime().await);
        marker.release().await;
    }

    Ok(())
}
