//! Metadata store trait definition.

use async_trait::async_trait;
use blobvault_core::{
    Blob, ContentHash, CreateBlobOutcome, FileId, FileReference, NewBlob, NewFileReference,
};
use blobvault_error::MetadataResult;

/// Persistent record keeping for blobs and file references.
///
/// Reference-count changes are atomic conditional writes. A blob whose count
/// has reached zero is *retired*: it can no longer be incremented or
/// decremented, only revived by [`MetadataStore::create_blob`] or deleted by
/// [`MetadataStore::delete_blob`].
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Look up a blob by content hash, retired or not.
    async fn get_blob(&self, hash: &ContentHash) -> MetadataResult<Option<Blob>>;

    /// Atomically insert a blob with one reference.
    ///
    /// If a live record already owns the hash, nothing changes and it is
    /// returned as [`CreateBlobOutcome::Existing`]. A retired record is
    /// revived in place with the new location, size and content type, and
    /// reported as [`CreateBlobOutcome::Created`].
    async fn create_blob(&self, blob: NewBlob) -> MetadataResult<CreateBlobOutcome>;

    /// Add one reference to a live blob.
    ///
    /// # Errors
    ///
    /// `NotFound` when the blob is absent or retired.
    async fn increment_blob_ref(&self, hash: &ContentHash) -> MetadataResult<Blob>;

    /// Drop one reference, returning the record after the decrement.
    ///
    /// # Errors
    ///
    /// `NotFound` when the blob is absent or already retired.
    async fn decrement_blob_ref(&self, hash: &ContentHash) -> MetadataResult<Blob>;

    /// Delete a retired blob record.
    ///
    /// Refused (returns `false`) unless the count is exactly zero and the
    /// record still points at `expected_location`, so a blob revived by a
    /// concurrent upload is never removed.
    async fn delete_blob(&self, hash: &ContentHash, expected_location: &str)
    -> MetadataResult<bool>;

    /// Every blob record, oldest first.
    async fn list_blobs(&self) -> MetadataResult<Vec<Blob>>;

    /// Insert a file reference and return it resolved against its blob.
    ///
    /// # Errors
    ///
    /// `Integrity` when the blob does not exist, `Conflict` on a duplicate id.
    async fn create_file_reference(&self, file: NewFileReference)
    -> MetadataResult<FileReference>;

    /// Look up a resolved file reference.
    async fn get_file_reference(&self, id: &FileId) -> MetadataResult<Option<FileReference>>;

    /// The blob hash a file reference points at.
    ///
    /// Lighter than [`MetadataStore::get_file_reference`] since it skips the
    /// blob join and any cache. The engine's `remove` resolves through the
    /// full reference instead, because a failed decrement restores it.
    async fn get_blob_hash_for_file_reference(
        &self,
        id: &FileId,
    ) -> MetadataResult<Option<ContentHash>>;

    /// Delete a file reference. Returns `false` if it did not exist.
    async fn delete_file_reference(&self, id: &FileId) -> MetadataResult<bool>;

    /// Every file reference, most recent first.
    async fn list_file_references(&self) -> MetadataResult<Vec<FileReference>>;
}
