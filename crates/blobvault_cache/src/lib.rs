//! Time-bounded caching for metadata reads.
//!
//! Caches here are shadows: never authoritative, safe to drop at any time.
//! Values are JSON so any serde type can be stored behind a string key.

#![warn(missing_docs)]

mod cache;
mod config;
mod memory;

pub use cache::{Cache, NoopCache};
pub use config::{CacheConfig, CacheConfigBuilder, build_cache};
pub use memory::{CacheEntry, MemoryCache};
