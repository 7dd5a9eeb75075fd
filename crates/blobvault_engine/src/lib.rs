//! Deduplication and reference-counting engine for blobvault.
//!
//! [`DedupEngine`] sits between a [`StorageBackend`](blobvault_storage::StorageBackend)
//! holding physical bytes and a [`MetadataStore`](blobvault_metadata::MetadataStore)
//! holding blob and file-reference records.
//!
//! # Operations
//!
//! - [`DedupEngine::store`]: hash while writing, then create or share a blob
//! - [`DedupEngine::fetch`]: open a read stream for a file reference
//! - [`DedupEngine::remove`]: drop a reference and reclaim the blob when it was the last
//! - [`DedupEngine::enumerate`]: list file references, newest first
//! - [`DedupEngine::sweep`]: reconcile backend objects against blob records
//!
//! Every failed or cancelled upload is compensated: no records survive it and
//! its candidate object is deleted, or left for the sweep if that fails.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod pending;
mod sweep;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::{DedupEngine, RemoveOutcome};
pub use sweep::{SweepOptions, SweepReport};
