//! Behavior every coordinating backend must show, run from each backend's
//! test file.

#![allow(dead_code)]

use std::time::Duration;

use tokio::time::{Instant, sleep};
use ttl_lock::{Lease, LockBackend, LockError, LockStore, owner};

/// Builds two stores (owners "A" and "B") on the same backend and name.
pub trait StorePair {
    type Backend: LockBackend;

    fn store(&self, name: &str, lease: Lease, owner: &str) -> LockStore<Self::Backend>;
}

impl<B, F> StorePair for F
where
    B: LockBackend,
    F: Fn(&str, Lease, &str) -> LockStore<B>,
{
    type Backend = B;

    fn store(&self, name: &str, lease: Lease, owner: &str) -> LockStore<B> {
        self(name, lease, owner)
    }
}

/// A lock name no other test run uses, for shared servers.
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", owner::generate())
}

pub fn secs(s: f64) -> Lease {
    Lease::For(Duration::from_secs_f64(s))
}

pub async fn mutual_exclusion<P: StorePair>(pair: &P, name: &str) {
    let a = pair.store(name, secs(30.0), "A");
    let b = pair.store(name, secs(30.0), "B");

    assert!(a.acquire().await);
    assert!(!b.acquire().await);
    assert!(a.is_acquired().await);
    assert!(!b.is_acquired().await);
    assert_eq!(b.remaining_lifetime().await, Duration::ZERO);

    assert!(a.release().await);
    assert!(b.acquire().await);
    assert!(b.release().await);
}

pub async fn reentrant_refresh<P: StorePair>(pair: &P, name: &str) {
    let a = pair.store(name, secs(5.0), "A");

    assert!(a.acquire().await);
    let first = a.holder().await.unwrap().unwrap().until;
    sleep(Duration::from_millis(20)).await;
    assert!(a.acquire().await);
    let second = a.holder().await.unwrap().unwrap().until;
    assert!(second > first, "until should move forward: {first} -> {second}");

    a.release().await;
}

pub async fn remaining_lifetime_is_bounded<P: StorePair>(pair: &P, name: &str) {
    let a = pair.store(name, secs(5.0), "A");

    assert_eq!(a.remaining_lifetime().await, Duration::ZERO);
    assert!(a.acquire().await);
    let remaining = a.remaining_lifetime().await;
    assert!(remaining > Duration::ZERO);
    assert!(remaining <= Duration::from_secs(5));

    a.release().await;
}

pub async fn expiry_frees_the_lock<P: StorePair>(pair: &P, name: &str) {
    let a = pair.store(name, secs(0.3), "A");
    let b = pair.store(name, secs(0.3), "B");

    assert!(a.acquire().await);
    assert!(!b.acquire().await);
    sleep(Duration::from_millis(400)).await;

    assert!(!a.is_acquired().await);
    assert!(b.acquire().await);
    assert!(!a.release().await);
    assert!(b.release().await);
}

pub async fn release_checks_owner<P: StorePair>(pair: &P, name: &str) {
    let a = pair.store(name, secs(30.0), "A");
    let b = pair.store(name, secs(30.0), "B");

    assert!(a.acquire().await);
    let before = a.holder().await.unwrap();
    assert!(!b.release().await);
    assert_eq!(a.holder().await.unwrap(), before);

    b.force_release().await;
    assert!(!a.is_acquired().await);
    assert!(b.acquire().await);
    b.force_release().await;
}

pub async fn blocking_waits_for_expiry<P: StorePair>(pair: &P, name: &str) {
    let a = pair.store(name, secs(1.0), "A");
    let b = pair.store(name, secs(1.0), "B");

    assert!(a.acquire().await);
    let result = b.block(Duration::from_millis(500)).await;
    assert!(matches!(result, Err(LockError::Timeout(_))));

    let start = Instant::now();
    b.block(Duration::from_secs(3)).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(b.is_acquired().await);
    assert!(b.release().await);
}

pub async fn blocking_sees_release<P: StorePair>(pair: &P, name: &str) {
    let a = pair.store(name, secs(30.0), "A");
    let b = pair.store(name, secs(30.0), "B");

    assert!(a.acquire().await);
    let (released, blocked) = tokio::join!(
        async {
            sleep(Duration::from_millis(100)).await;
            a.release().await
        },
        b.block(Duration::from_secs(5)),
    );
    assert!(released);
    blocked.unwrap();
    assert!(b.release().await);
}

pub async fn scoped_callbacks_release<P: StorePair>(pair: &P, name: &str) {
    let a = pair.store(name, secs(30.0), "A");
    let b = pair.store(name, secs(30.0), "B");

    let value = a
        .get_with(|| async { b.is_acquired().await })
        .await
        .unwrap();
    assert_eq!(value, Some(false));
    assert!(!a.is_acquired().await);

    assert!(b.acquire().await);
    assert_eq!(a.get_with(|| async { 1 }).await.unwrap(), None);
    b.release().await;

    let value = a
        .block_with(Duration::from_secs(1), || async { 7 })
        .await
        .unwrap();
    assert_eq!(value, 7);
    assert!(b.acquire().await);
    b.release().await;
}

pub async fn forever_lease_needs_release<P: StorePair>(pair: &P, name: &str) {
    let a = pair.store(name, Lease::Forever, "A");
    let b = pair.store(name, Lease::Forever, "B");

    assert!(a.acquire().await);
    assert_eq!(a.remaining_lifetime().await, Duration::MAX);
    assert!(!b.acquire().await);
    assert!(a.release().await);
    assert!(b.acquire().await);
    b.force_release().await;
}

/// Two seconds of A, then B takes over once A's hold lapses.
pub async fn job_42<P: StorePair>(pair: &P, name: &str) {
    let a = pair.store(name, secs(2.0), "A");
    let b = pair.store(name, secs(2.0), "B");

    assert!(a.acquire().await);
    assert!(!b.acquire().await);
    sleep(Duration::from_millis(2100)).await;
    assert!(b.acquire().await);
    assert!(!a.release().await);
    assert!(b.release().await);
}

/// Runs every scenario, each on its own name derived from `prefix`.
pub async fn conformance<P: StorePair>(pair: &P, prefix: &str) {
    mutual_exclusion(pair, &format!("{prefix}-exclusion")).await;
    reentrant_refresh(pair, &format!("{prefix}-refresh")).await;
    remaining_lifetime_is_bounded(pair, &format!("{prefix}-remaining")).await;
    expiry_frees_the_lock(pair, &format!("{prefix}-expiry")).await;
    release_checks_owner(pair, &format!("{prefix}-release")).await;
    blocking_waits_for_expiry(pair, &format!("{prefix}-block-expiry")).await;
    blocking_sees_release(pair, &format!("{prefix}-block-release")).await;
    scoped_callbacks_release(pair, &format!("{prefix}-scoped")).await;
    forever_lease_needs_release(pair, &format!("{prefix}-forever")).await;
}
