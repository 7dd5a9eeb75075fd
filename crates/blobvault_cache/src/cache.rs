//! Cache trait and the no-op implementation.

use serde_json::Value as JsonValue;
use std::time::Duration;

/// Key-value cache with per-entry TTL.
///
/// Operations are synchronous and infallible: a cache that cannot serve a
/// read simply misses.
pub trait Cache: Send + Sync {
    /// Look up a live entry.
    fn get(&self, key: &str) -> Option<JsonValue>;

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    fn set(&self, key: &str, value: JsonValue, ttl: Duration);

    /// Drop the entry for `key`, if any.
    fn invalidate(&self, key: &str);
}

/// A cache that stores nothing. Every read misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _key: &str) -> Option<JsonValue> {
        None
    }

    fn set(&self, _key: &str, _value: JsonValue, _ttl: Duration) {}

    fn invalidate(&self, _key: &str) {}
}
