//! Example: Switching backends behind one factory
//!
//! Run with: `cargo run --example factory`

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use ttl_lock::*;

/// Application code only knows about a provider.
async fn nightly_report<P: LockProvider>(provider: &P) -> LockResult<()> {
    let lock = provider.lock("nightly-report", Lease::Default, None)?;
    match lock.get_with(|| async { "report written" }).await? {
        Some(outcome) => println!("  {} ({})", outcome, lock.backend().kind()),
        None => println!("  another worker is writing the report"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let factory = LockFactory::builder()
        .root(std::env::temp_dir().join("ttl-locks"))
        .lease(Lease::For(Duration::from_secs(60)))
        .owner(format!("report-worker-{}", std::process::id()))
        .build()?;

    println!("=== File backend ===");
    nightly_report(&factory.bind(FileBackend::new(factory.root()))).await?;

    println!("=== SQLite backend ===");
    nightly_report(&factory.bind(factory.sqlite_backend(None, None)?)).await?;

    println!("=== In-memory cache backend ===");
    nightly_report(&factory.bind(CacheBackend::new(MemoryCache::new()))).await?;

    println!("=== Locking disabled ===");
    nightly_report(&factory.bind(NoopBackend)).await?;

    // Stuck holder recovery
    let stuck = factory.create_file_lock("stuck-job", Lease::Forever, Some("crashed-worker"))?;
    stuck.acquire().await;
    let rescuer = factory.create_file_lock("stuck-job", Lease::Default, None)?;
    println!("\nstuck-job free? {}", rescuer.acquire().await);
    rescuer.force_release().await;
    println!("after force release? {}", rescuer.acquire().await);
    rescuer.release().await;

    Ok(())
}
