//! Core data types for blobvault.
//!
//! A [`Blob`] is one unique piece of content, keyed by its [`ContentHash`] and
//! reference-counted. A [`FileReference`] is what clients see: a named,
//! independently identified pointer to exactly one blob.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod blob;
mod file_reference;
mod hash;
mod telemetry;

pub use blob::{Blob, CreateBlobOutcome, NewBlob};
pub use file_reference::{FileId, FileReference, NewFileReference, UploadRequest};
pub use hash::{ContentHash, ContentHasher};
pub use telemetry::{init_telemetry, shutdown_telemetry};
