//! Client-visible logical files.

use crate::{Blob, ContentHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Externally visible identifier of a file reference.
///
/// # Examples
///
/// ```
/// use blobvault_core::FileId;
///
/// let id = FileId::new();
/// let parsed: FileId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for FileId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A logical file resolved against its blob.
///
/// `size` and `content_type` come from the blob and are authoritative over
/// whatever the uploader declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    /// Immutable identifier
    pub id: FileId,
    /// Client-supplied name, opaque to the store
    pub name: String,
    /// Hash of the blob this file points at
    pub hash: ContentHash,
    /// When the reference was created
    pub created_at: DateTime<Utc>,
    /// Resolved content size in bytes
    pub size: u64,
    /// Resolved content type
    pub content_type: String,
}

/// Values needed to create a file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileReference {
    /// Identifier to assign
    pub id: FileId,
    /// Client-supplied name
    pub name: String,
    /// Target blob
    pub hash: ContentHash,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl NewFileReference {
    /// A new reference with a fresh id, stamped now.
    pub fn new(name: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            id: FileId::new(),
            name: name.into(),
            hash,
            created_at: Utc::now(),
        }
    }

    /// Resolve against the blob it points at.
    pub fn resolve(self, blob: &Blob) -> FileReference {
        FileReference {
            id: self.id,
            name: self.name,
            hash: self.hash,
            created_at: self.created_at,
            size: blob.size,
            content_type: blob.content_type.clone(),
        }
    }
}

/// What a caller declares about an upload before streaming its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct UploadRequest {
    /// Name hint for the new file reference
    name: String,
    /// Size the caller promises to send
    declared_size: u64,
    /// Content type the caller claims
    content_type: String,
}

impl UploadRequest {
    /// Describe an upload.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobvault_core::UploadRequest;
    ///
    /// let request = UploadRequest::new("a.txt", 13, "text/plain");
    /// assert_eq!(*request.declared_size(), 13);
    /// ```
    pub fn new(name: impl Into<String>, declared_size: u64, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_size,
            content_type: content_type.into(),
        }
    }
}
