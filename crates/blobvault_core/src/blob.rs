//! Blob records: one per unique content hash.

use crate::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unique content unit and its reference count.
///
/// The storage location is backend-specific and never leaves the server; it
/// is deliberately absent from [`crate::FileReference`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    /// SHA-256 of the content (primary key)
    pub hash: ContentHash,
    /// Size of the content in bytes
    pub size: u64,
    /// Content type declared by the first uploader
    pub content_type: String,
    /// Backend key or relative path of the physical object
    pub storage_location: String,
    /// Number of live file references pointing here
    pub ref_count: u64,
    /// When the blob was first committed
    pub created_at: DateTime<Utc>,
    /// Last reference-count change
    pub updated_at: DateTime<Utc>,
}

impl Blob {
    /// A blob with no references is retired: unreadable and awaiting reclamation.
    pub fn is_retired(&self) -> bool {
        self.ref_count == 0
    }
}

/// Values needed to commit a new blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlob {
    /// SHA-256 of the content
    pub hash: ContentHash,
    /// Size of the content in bytes
    pub size: u64,
    /// Declared content type
    pub content_type: String,
    /// Where the candidate bytes were written
    pub storage_location: String,
}

impl NewBlob {
    /// Materialise the record as it looks right after creation.
    pub fn into_blob(self, now: DateTime<Utc>) -> Blob {
        Blob {
            hash: self.hash,
            size: self.size,
            content_type: self.content_type,
            storage_location: self.storage_location,
            ref_count: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Result of the atomic create-or-find on a hash key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateBlobOutcome {
    /// The record now points at the new location with one reference.
    /// Also returned when a retired record was revived.
    Created(Blob),
    /// A live record already owned the hash; nothing was written.
    Existing(Blob),
}
