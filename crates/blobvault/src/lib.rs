//! Blobvault: a content-addressable blob store.
//!
//! Uploaded content is stored once per unique SHA-256 digest and shared by
//! any number of named file references through a reference count. The last
//! reference to go takes the physical object with it.
//!
//! # Quick Start
//!
//! ```no_run
//! use blobvault::{UploadRequest, Vault};
//! use blobvault_storage::stream_from_bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let vault = Vault::open(None).await?;
//! let file = vault
//!     .engine()
//!     .store(
//!         UploadRequest::new("hello.txt", 13, "text/plain"),
//!         stream_from_bytes(&b"Hello, World!"[..]),
//!     )
//!     .await?;
//! println!("{} -> {}", file.id, file.hash);
//! # Ok(())
//! # }
//! ```
//!
//! # Cargo Features
//!
//! - `postgres` - PostgreSQL metadata store
//!
//! # Architecture
//!
//! - `blobvault_error` - Error types
//! - `blobvault_core` - Blob and file-reference types, hashing, telemetry
//! - `blobvault_storage` - Local and remote object backends
//! - `blobvault_cache` - Metadata cache
//! - `blobvault_metadata` - Metadata stores
//! - `blobvault_engine` - Deduplication engine and sweep
//!
//! This crate (`blobvault`) re-exports the common types and adds
//! configuration loading and wiring.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod vault;

pub use blobvault_core::{
    Blob, ContentHash, FileId, FileReference, UploadRequest, init_telemetry, shutdown_telemetry,
};
pub use blobvault_engine::{DedupEngine, EngineConfig, RemoveOutcome, SweepOptions, SweepReport};
pub use blobvault_error::*;
pub use config::{MetadataConfig, VaultConfig, env_source};
pub use vault::Vault;
