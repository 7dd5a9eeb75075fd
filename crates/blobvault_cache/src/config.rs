//! Cache configuration.

use crate::{Cache, MemoryCache, NoopCache};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the metadata cache.
///
/// # Example
///
/// ```
/// use blobvault_cache::CacheConfig;
///
/// let config = CacheConfig::default().with_list_ttl_secs(30);
/// assert_eq!(*config.file_ttl_secs(), 3600);
/// assert_eq!(config.list_ttl().as_secs(), 30);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    #[serde(default = "default_enabled")]
    enabled: bool,

    /// Maximum cache size (number of entries)
    #[serde(default = "default_max_entries")]
    max_entries: usize,

    /// TTL for single file-reference entries (seconds)
    #[serde(default = "default_file_ttl_secs")]
    file_ttl_secs: u64,

    /// TTL for the file listing entry (seconds)
    #[serde(default = "default_list_ttl_secs")]
    list_ttl_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_entries() -> usize {
    10_000
}

fn default_file_ttl_secs() -> u64 {
    3600 // 1 hour
}

fn default_list_ttl_secs() -> u64 {
    600 // 10 minutes
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_entries: default_max_entries(),
            file_ttl_secs: default_file_ttl_secs(),
            list_ttl_secs: default_list_ttl_secs(),
        }
    }
}

impl CacheConfig {
    /// TTL for single file-reference entries.
    pub fn file_ttl(&self) -> Duration {
        Duration::from_secs(self.file_ttl_secs)
    }

    /// TTL for the file listing entry.
    pub fn list_ttl(&self) -> Duration {
        Duration::from_secs(self.list_ttl_secs)
    }
}

/// The cache this configuration asks for: a [`MemoryCache`] when enabled,
/// otherwise a [`NoopCache`].
pub fn build_cache(config: &CacheConfig) -> Arc<dyn Cache> {
    if config.enabled {
        Arc::new(MemoryCache::new(config.max_entries))
    } else {
        tracing::info!("Metadata cache disabled");
        Arc::new(NoopCache)
    }
}
