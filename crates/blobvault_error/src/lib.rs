//! Error types for blobvault.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Each layer has its own result alias ([`StorageResult`], [`MetadataResult`],
//! [`EngineResult`]). [`VaultError`] collects all of them for the facade crate
//! and the command-line tool.
//!
//! # Examples
//!
//! ```
//! use blobvault_error::{EngineError, EngineErrorKind, EngineResult};
//!
//! fn lookup() -> EngineResult<()> {
//!     Err(EngineError::new(EngineErrorKind::NotFound("3f2a".to_string())))
//! }
//!
//! let err = lookup().unwrap_err();
//! assert!(err.kind().is_client_error());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod json;
mod metadata;
mod storage;

pub use config::{ConfigError, ConfigErrorKind};
pub use engine::{EngineError, EngineErrorKind, EngineResult};
pub use error::{VaultError, VaultErrorKind, VaultResult};
pub use json::JsonError;
pub use metadata::{MetadataError, MetadataErrorKind, MetadataResult};
pub use storage::{StorageError, StorageErrorKind, StorageResult};
