//! Object backends for blobvault.
//!
//! A backend stores opaque byte streams at relative locations. It is the
//! only layer that touches physical bytes; deduplication, hashing and
//! reference counting all live above it in `blobvault_engine`.
//!
//! # Backends
//!
//! - [`FileSystemBackend`]: a directory tree on local disk, sandboxed to its root
//! - [`RemoteBackend`]: a filer cluster reached over HTTP
//!
//! # Example
//!
//! ```rust
//! use blobvault_storage::{FileSystemBackend, StorageBackend, collect_stream, stream_from_bytes};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = FileSystemBackend::new("/tmp/blobvault-doc").await?;
//!
//! let written = backend
//!     .put("blobs/ab/cd/example", stream_from_bytes(b"hello".to_vec()), 5)
//!     .await?;
//! assert_eq!(written, 5);
//!
//! let body = collect_stream(backend.get("blobs/ab/cd/example").await?).await?;
//! assert_eq!(body, b"hello");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod filesystem;
mod remote;
mod storage;

pub use blobvault_error::{StorageError, StorageErrorKind, StorageResult};
pub use config::{BackendConfig, connect_backend};
pub use filesystem::FileSystemBackend;
pub use remote::{RemoteBackend, RemoteBackendConfig, derive_filer_url};
pub use storage::{ByteStream, StorageBackend, collect_stream, stream_from_bytes};
