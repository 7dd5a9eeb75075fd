//! Storage trait definition.

use async_trait::async_trait;
use blobvault_error::StorageResult;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

/// A chunked byte stream, used for both uploads and downloads.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Wrap an in-memory buffer as a single-chunk [`ByteStream`].
///
/// # Examples
///
/// ```
/// use blobvault_storage::{collect_stream, stream_from_bytes};
///
/// futures::executor::block_on(async {
///     let stream = stream_from_bytes(b"Hello, World!".to_vec());
///     assert_eq!(collect_stream(stream).await.unwrap(), b"Hello, World!");
/// });
/// ```
pub fn stream_from_bytes(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Drain a [`ByteStream`] into memory.
pub async fn collect_stream(stream: ByteStream) -> std::io::Result<Vec<u8>> {
    stream
        .try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
}

/// Trait for pluggable object backends.
///
/// A backend only moves bytes. Locations are relative keys such as
/// `blobs/ab/cd/<uuid>`; whoever calls `put` picks them. Backends never see
/// content hashes and know nothing about reference counts.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write a stream to `location`, returning the number of bytes written.
    ///
    /// `declared_size` is advisory; the returned count is what was actually
    /// stored. A partially written object is removed before an error is
    /// returned.
    ///
    /// # Errors
    ///
    /// `InvalidPath` for locations that escape the backend root, before any
    /// I/O. Write, read and transport failures otherwise.
    async fn put(&self, location: &str, body: ByteStream, declared_size: u64)
    -> StorageResult<u64>;

    /// Open the object at `location` for streaming.
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing exists there.
    async fn get(&self, location: &str) -> StorageResult<ByteStream>;

    /// Remove the object at `location`. Deleting a missing object succeeds.
    async fn delete(&self, location: &str) -> StorageResult<()>;

    /// List every object location under `prefix`, recursively, sorted.
    ///
    /// An empty prefix lists the whole backend. A prefix that does not exist
    /// yields an empty list.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Short name for logs, e.g. `"filesystem"`.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
