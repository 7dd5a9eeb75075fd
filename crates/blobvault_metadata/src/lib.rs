//! Metadata stores for blobvault.
//!
//! This crate owns the persisted records: one [`Blob`](blobvault_core::Blob)
//! per unique content hash and any number of
//! [`FileReference`](blobvault_core::FileReference)s pointing at it.
//!
//! # Features
//!
//! - [`InMemoryMetadataStore`] for tests and single-process use
//! - [`CachedMetadataStore`] read-through cache decorator for file lookups
//! - `PostgresMetadataStore` (feature `postgres`): Diesel + r2d2 with
//!   embedded migrations
//!
//! # Example
//!
//! ```rust
//! use blobvault_cache::{CacheConfig, MemoryCache};
//! use blobvault_metadata::{CachedMetadataStore, InMemoryMetadataStore};
//! use std::sync::Arc;
//!
//! let store = CachedMetadataStore::from_config(
//!     InMemoryMetadataStore::new(),
//!     Arc::new(MemoryCache::new(1000)),
//!     &CacheConfig::default(),
//! );
//! # let _ = store;
//! ```

#![warn(missing_docs)]

mod cached;
mod memory;
mod store;

#[cfg(feature = "postgres")]
mod postgres;

pub use cached::{CachedMetadataStore, FILE_LIST_KEY, file_key};
pub use memory::InMemoryMetadataStore;
pub use store::MetadataStore;

#[cfg(feature = "postgres")]
pub use postgres::{PgPool, PostgresMetadataStore, run_migrations, schema};
