//! Lock records stored as cache entries.

use std::time::Duration;

use tracing::{debug, instrument};

use ttl_lock_core::error::LockResult;
use ttl_lock_core::record::{LockRecord, ReadPolicy, decode_record};
use ttl_lock_core::traits::LockBackend;

use crate::client::CacheClient;

/// Key prefix used unless [`CacheBackend::with_prefix`] overrides it.
pub const DEFAULT_PREFIX: &str = "ttl-lock:";

/// Slack added to the native TTL so the record, not the cache, decides expiry.
const NATIVE_TTL_MARGIN: Duration = Duration::from_secs(1);

/// Keeps one cache entry per lock name.
///
/// The entry holds the JSON record and carries a native TTL slightly longer
/// than the hold, so abandoned locks disappear from the cache on their own.
/// Conditional writes go through the client's `add` and `compare_and_swap`,
/// comparing against the exact value that was read.
#[derive(Debug, Clone)]
pub struct CacheBackend<C> {
    client: C,
    prefix: String,
    read_policy: ReadPolicy,
}

impl<C: CacheClient> CacheBackend<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            prefix: DEFAULT_PREFIX.to_string(),
            read_policy: ReadPolicy::default(),
        }
    }

    /// Namespaces keys, e.g. per application sharing one cache.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets how undecodable entries are treated.
    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn key_for(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    async fn read_raw(&self, key: &str) -> LockResult<(Option<String>, Option<LockRecord>)> {
        let raw = self.client.get(key).await?;
        let record = match &raw {
            Some(value) => decode_record(value.as_bytes(), self.read_policy)?,
            None => None,
        };
        Ok((raw, record))
    }
}

/// Native TTL for a record written at `now`; `None` keeps forever holds.
fn native_ttl(record: &LockRecord, now: f64) -> Option<Duration> {
    if record.never_expires() {
        return None;
    }
    let remaining = Duration::try_from_secs_f64((record.until - now).max(0.0)).ok()?;
    remaining.checked_add(NATIVE_TTL_MARGIN)
}

impl<C: CacheClient> LockBackend for CacheBackend<C> {
    fn kind(&self) -> &'static str {
        "cache"
    }

    #[instrument(level = "trace", skip(self), fields(backend = "cache"))]
    async fn read(&self, name: &str) -> LockResult<Option<LockRecord>> {
        let (_, record) = self.read_raw(&self.key_for(name)).await?;
        Ok(record)
    }

    #[instrument(
        level = "trace", skip(self, record),
        fields(
            backend = "cache",
            owner = %record.owner,
        )
    )]
    async fn write(&self, name: &str, record: &LockRecord, now: f64) -> LockResult<bool> {
        let key = self.key_for(name);
        let value = record.encode()?;
        let ttl = native_ttl(record, now);

        let (raw, current) = self.read_raw(&key).await?;
        match raw {
            None => self.client.add(&key, &value, ttl).await,
            Some(raw) => {
                // Undecodable content under the fail-open policy counts as free.
                let admitted = current.is_none_or(|current| current.admits(&record.owner, now));
                if !admitted {
                    debug!("cache entry held by another owner");
                    return Ok(false);
                }
                self.client.compare_and_swap(&key, &raw, &value, ttl).await
            }
        }
    }

    #[instrument(level = "trace", skip(self), fields(backend = "cache"))]
    async fn clear(&self, name: &str, owner: Option<&str>) -> LockResult<bool> {
        let key = self.key_for(name);
        let Some(owner) = owner else {
            return self.client.delete(&key).await;
        };

        let (raw, current) = self.read_raw(&key).await?;
        match (raw, current) {
            (Some(raw), Some(current)) if current.owner == owner => {
                self.client.compare_and_delete(&key, &raw).await
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCache;

    fn backend() -> CacheBackend<MemoryCache> {
        CacheBackend::new(MemoryCache::new())
    }

    #[test]
    fn native_ttl_outlives_the_hold() {
        assert_eq!(
            native_ttl(&LockRecord::new("a", 12.0), 10.0),
            Some(Duration::from_secs(3))
        );
        assert_eq!(
            native_ttl(&LockRecord::new("a", LockRecord::NEVER_EXPIRES), 10.0),
            None
        );
    }

    #[tokio::test]
    async fn keys_are_prefixed() {
        let backend = backend().with_prefix("app:");
        backend.write("job", &LockRecord::new("a", 100.0), 50.0).await.unwrap();
        assert!(backend.client().get("app:job").await.unwrap().is_some());
        assert_eq!(backend.key_for("job"), "app:job");
    }

    #[tokio::test]
    async fn write_is_free_or_self() {
        let backend = backend();
        let now = ttl_lock_core::record::clock::now();

        assert!(backend.write("job", &LockRecord::new("a", now + 60.0), now).await.unwrap());
        assert!(!backend.write("job", &LockRecord::new("b", now + 60.0), now).await.unwrap());
        assert!(backend.write("job", &LockRecord::new("a", now + 90.0), now).await.unwrap());
        assert_eq!(
            backend.read("job").await.unwrap(),
            Some(LockRecord::new("a", now + 90.0))
        );
    }

    #[tokio::test]
    async fn expired_record_can_be_taken() {
        let backend = backend();
        let now = ttl_lock_core::record::clock::now();
        backend
            .client()
            .set("ttl-lock:job", &LockRecord::new("a", now - 1.0).encode().unwrap(), None)
            .await
            .unwrap();

        assert!(backend.write("job", &LockRecord::new("b", now + 5.0), now).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_is_free_when_failing_open() {
        let backend = backend();
        let now = ttl_lock_core::record::clock::now();
        backend.client().set("ttl-lock:job", "{oops", None).await.unwrap();

        assert_eq!(backend.read("job").await.unwrap(), None);
        assert!(backend.write("job", &LockRecord::new("b", now + 5.0), now).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_is_an_error_when_failing_closed() {
        let backend = backend().with_read_policy(ReadPolicy::FailClosed);
        backend.client().set("ttl-lock:job", "{oops", None).await.unwrap();
        assert!(backend.read("job").await.is_err());
    }

    #[tokio::test]
    async fn owned_clear_spares_other_holders() {
        let backend = backend();
        let now = ttl_lock_core::record::clock::now();
        backend.write("job", &LockRecord::new("a", now + 60.0), now).await.unwrap();

        assert!(!backend.clear("job", Some("b")).await.unwrap());
        assert!(backend.clear("job", Some("a")).await.unwrap());
        assert!(!backend.clear("job", None).await.unwrap());
    }
}
