//! In-memory metadata store.
//!
//! A single `RwLock` guards both tables, so every operation is one critical
//! section and the conditional updates are trivially atomic. All data is lost
//! when the store is dropped.

use crate::MetadataStore;
use async_trait::async_trait;
use blobvault_core::{
    Blob, ContentHash, CreateBlobOutcome, FileId, FileReference, NewBlob, NewFileReference,
};
use blobvault_error::{MetadataError, MetadataErrorKind, MetadataResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Internal storage structure for file references.
#[derive(Debug, Clone)]
struct StoredFile {
    name: String,
    hash: ContentHash,
    created_at: DateTime<Utc>,
    /// Insertion order, breaks ties between equal timestamps
    seq: u64,
}

#[derive(Debug, Default)]
struct Tables {
    blobs: HashMap<ContentHash, Blob>,
    files: HashMap<FileId, StoredFile>,
    next_seq: u64,
}

impl Tables {
    fn resolve(&self, id: FileId, stored: &StoredFile) -> MetadataResult<FileReference> {
        let blob = self.blobs.get(&stored.hash).ok_or_else(|| {
            MetadataError::new(MetadataErrorKind::Integrity(format!(
                "file {} points at missing blob {}",
                id, stored.hash
            )))
        })?;
        Ok(FileReference {
            id,
            name: stored.name.clone(),
            hash: stored.hash.clone(),
            created_at: stored.created_at,
            size: blob.size,
            content_type: blob.content_type.clone(),
        })
    }
}

/// In-memory metadata store, used for tests and single-process deployments.
///
/// # Example
/// ```
/// use blobvault_core::{ContentHash, NewBlob};
/// use blobvault_metadata::{InMemoryMetadataStore, MetadataStore};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = InMemoryMetadataStore::new();
/// let hash = ContentHash::compute(b"Hello, World!");
///
/// store.create_blob(NewBlob {
///     hash: hash.clone(),
///     size: 13,
///     content_type: "text/plain".to_string(),
///     storage_location: "blobs/ab/cd/abcd".to_string(),
/// }).await.unwrap();
///
/// assert_eq!(store.get_blob(&hash).await.unwrap().unwrap().ref_count, 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryMetadataStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blob records, retired ones included.
    pub async fn blob_count(&self) -> usize {
        self.tables.read().await.blobs.len()
    }

    /// Number of file references.
    pub async fn file_count(&self) -> usize {
        self.tables.read().await.files.len()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn get_blob(&self, hash: &ContentHash) -> MetadataResult<Option<Blob>> {
        Ok(self.tables.read().await.blobs.get(hash).cloned())
    }

    #[tracing::instrument(skip(self, blob), fields(hash = %blob.hash))]
    async fn create_blob(&self, blob: NewBlob) -> MetadataResult<CreateBlobOutcome> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        match tables.blobs.get_mut(&blob.hash) {
            Some(existing) if !existing.is_retired() => {
                Ok(CreateBlobOutcome::Existing(existing.clone()))
            }
            Some(retired) => {
                tracing::debug!("Reviving retired blob");
                retired.size = blob.size;
                retired.content_type = blob.content_type;
                retired.storage_location = blob.storage_location;
                retired.ref_count = 1;
                retired.updated_at = now;
                Ok(CreateBlobOutcome::Created(retired.clone()))
            }
            None => {
                let created = blob.into_blob(now);
                tables.blobs.insert(created.hash.clone(), created.clone());
                Ok(CreateBlobOutcome::Created(created))
            }
        }
    }

    async fn increment_blob_ref(&self, hash: &ContentHash) -> MetadataResult<Blob> {
        let mut tables = self.tables.write().await;
        match tables.blobs.get_mut(hash) {
            Some(blob) if !blob.is_retired() => {
                blob.ref_count += 1;
                blob.updated_at = Utc::now();
                Ok(blob.clone())
            }
            _ => Err(MetadataError::new(MetadataErrorKind::NotFound)),
        }
    }

    async fn decrement_blob_ref(&self, hash: &ContentHash) -> MetadataResult<Blob> {
        let mut tables = self.tables.write().await;
        match tables.blobs.get_mut(hash) {
            Some(blob) if !blob.is_retired() => {
                blob.ref_count -= 1;
                blob.updated_at = Utc::now();
                Ok(blob.clone())
            }
            _ => Err(MetadataError::new(MetadataErrorKind::NotFound)),
        }
    }

    async fn delete_blob(
        &self,
        hash: &ContentHash,
        expected_location: &str,
    ) -> MetadataResult<bool> {
        let mut tables = self.tables.write().await;
        let deletable = tables
            .blobs
            .get(hash)
            .is_some_and(|b| b.is_retired() && b.storage_location == expected_location);

        if deletable {
            tables.blobs.remove(hash);
        }
        Ok(deletable)
    }

    async fn list_blobs(&self) -> MetadataResult<Vec<Blob>> {
        let tables = self.tables.read().await;
        let mut blobs: Vec<Blob> = tables.blobs.values().cloned().collect();
        blobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.hash.cmp(&b.hash)));
        Ok(blobs)
    }

    #[tracing::instrument(skip(self, file), fields(file_id = %file.id, hash = %file.hash))]
    async fn create_file_reference(
        &self,
        file: NewFileReference,
    ) -> MetadataResult<FileReference> {
        let mut tables = self.tables.write().await;

        if !tables.blobs.contains_key(&file.hash) {
            return Err(MetadataError::new(MetadataErrorKind::Integrity(format!(
                "blob {} does not exist",
                file.hash
            ))));
        }
        if tables.files.contains_key(&file.id) {
            return Err(MetadataError::new(MetadataErrorKind::Conflict(format!(
                "file {} already exists",
                file.id
            ))));
        }

        let seq = tables.next_seq;
        tables.next_seq += 1;

        let stored = StoredFile {
            name: file.name,
            hash: file.hash,
            created_at: file.created_at,
            seq,
        };
        let resolved = tables.resolve(file.id, &stored)?;
        tables.files.insert(file.id, stored);
        Ok(resolved)
    }

    async fn get_file_reference(&self, id: &FileId) -> MetadataResult<Option<FileReference>> {
        let tables = self.tables.read().await;
        tables
            .files
            .get(id)
            .map(|stored| tables.resolve(*id, stored))
            .transpose()
    }

    async fn get_blob_hash_for_file_reference(
        &self,
        id: &FileId,
    ) -> MetadataResult<Option<ContentHash>> {
        let tables = self.tables.read().await;
        Ok(tables.files.get(id).map(|stored| stored.hash.clone()))
    }

    async fn delete_file_reference(&self, id: &FileId) -> MetadataResult<bool> {
        Ok(self.tables.write().await.files.remove(id).is_some())
    }

    async fn list_file_references(&self) -> MetadataResult<Vec<FileReference>> {
        let tables = self.tables.read().await;

        let mut stored: Vec<(&FileId, &StoredFile)> = tables.files.iter().collect();
        stored.sort_by(|(_, a), (_, b)| {
            b.created_at.cmp(&a.created_at).then(b.seq.cmp(&a.seq))
        });

        stored
            .into_iter()
            .map(|(id, file)| tables.resolve(*id, file))
            .collect()
    }
}
