//! In-process cache for single-host deployments and tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use ttl_lock_core::error::LockResult;

use crate::client::CacheClient;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: &str, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A [`CacheClient`] backed by a concurrent hash map.
///
/// Clones share the same map. Expired entries are dropped lazily when they
/// are next touched.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let value = self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone());
        if value.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        value
    }
}

impl CacheClient for MemoryCache {
    async fn get(&self, key: &str) -> LockResult<Option<String>> {
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> LockResult<()> {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl, Instant::now()));
        Ok(())
    }

    async fn add(&self, key: &str, value: &str, ttl: Option<Duration>) -> LockResult<bool> {
        let now = Instant::now();
        let stored = match self.entries.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(CacheEntry::new(value, ttl, now));
                true
            }
            Entry::Occupied(mut slot) => {
                if slot.get().is_expired(now) {
                    slot.insert(CacheEntry::new(value, ttl, now));
                    true
                } else {
                    false
                }
            }
        };
        Ok(stored)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> LockResult<bool> {
        let now = Instant::now();
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(false);
        };
        if entry.is_expired(now) || entry.value != expected {
            return Ok(false);
        }
        *entry = CacheEntry::new(value, ttl, now);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> LockResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now)))
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> LockResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove_if(key, |_, entry| !entry.is_expired(now) && entry.value == expected)
            .is_some())
    }
}
