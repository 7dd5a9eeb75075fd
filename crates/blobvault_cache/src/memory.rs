//! In-process cache with TTL expiry and LRU eviction.

use crate::Cache;
use derive_getters::Getters;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Cache entry with value and expiration.
#[derive(Debug, Clone, Getters)]
pub struct CacheEntry {
    value: JsonValue,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    /// Check if this entry is expired.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }

    /// Get remaining time until expiration.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.ttl.checked_sub(self.created_at.elapsed())
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    access_order: VecDeque<String>,
}

impl Inner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.access_order.iter().position(|k| k == key) {
            self.access_order.remove(pos);
        }
        self.access_order.push_back(key.to_string());
    }

    fn forget(&mut self, key: &str) -> bool {
        if let Some(pos) = self.access_order.iter().position(|k| k == key) {
            self.access_order.remove(pos);
        }
        self.entries.remove(key).is_some()
    }
}

/// Bounded in-memory cache.
///
/// Expired entries are dropped lazily on read or in bulk through
/// [`MemoryCache::cleanup_expired`]. When full, the least recently used
/// entry is evicted.
///
/// # Example
///
/// ```
/// use blobvault_cache::{Cache, MemoryCache};
/// use serde_json::json;
/// use std::time::Duration;
///
/// let cache = MemoryCache::new(100);
/// cache.set("file:42", json!({"name": "a.txt"}), Duration::from_secs(60));
///
/// assert_eq!(cache.get("file:42"), Some(json!({"name": "a.txt"})));
///
/// cache.invalidate("file:42");
/// assert!(cache.get("file:42").is_none());
/// ```
#[derive(Debug)]
pub struct MemoryCache {
    max_entries: usize,
    inner: Mutex<Inner>,
}

impl MemoryCache {
    /// Create a cache holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        tracing::debug!(max_entries, "Creating new MemoryCache");
        Self {
            max_entries: max_entries.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    // A poisoned lock only means another thread panicked mid-update; the
    // map itself is still usable as a cache.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remove expired entries from cache.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.lock();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.forget(key);
        }

        if !expired.is_empty() {
            tracing::info!(
                removed = expired.len(),
                remaining = inner.entries.len(),
                "Cleaned up expired cache entries"
            );
        }
        expired.len()
    }

    /// Clear all cache entries.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        inner.access_order.clear();
        tracing::info!(cleared = count, "Cleared cache");
    }

    /// Get number of cached entries, expired ones included until cleanup.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Cache for MemoryCache {
    #[tracing::instrument(skip(self), level = "trace")]
    fn get(&self, key: &str) -> Option<JsonValue> {
        let mut inner = self.lock();

        let entry = inner.entries.get(key)?;
        if entry.is_expired() {
            tracing::debug!(key, "Cache entry expired, removing");
            inner.forget(key);
            return None;
        }

        let value = entry.value.clone();
        tracing::trace!(time_remaining = ?entry.time_remaining(), "Cache hit");
        inner.touch(key);
        Some(value)
    }

    #[tracing::instrument(skip(self, value), level = "trace")]
    fn set(&self, key: &str, value: JsonValue, ttl: Duration) {
        let mut inner = self.lock();

        if inner.entries.len() >= self.max_entries
            && !inner.entries.contains_key(key)
            && let Some(oldest) = inner.access_order.pop_front()
        {
            tracing::debug!(key = %oldest, "Evicting LRU entry");
            inner.entries.remove(&oldest);
        }

        inner.touch(key);
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    fn invalidate(&self, key: &str) {
        if self.lock().forget(key) {
            tracing::trace!(key, "Invalidated cache entry");
        }
    }
}
