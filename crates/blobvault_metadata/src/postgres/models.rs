//! Diesel models for the blob tables.

use super::schema::{blobs, file_references};
use blobvault_core::{Blob, ContentHash, FileId, FileReference, NewBlob, NewFileReference};
use blobvault_error::{MetadataError, MetadataErrorKind, MetadataResult};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Database row for the blobs table.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = blobs)]
#[diesel(primary_key(hash))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BlobRow {
    pub hash: String,
    pub size: i64,
    pub content_type: String,
    pub storage_location: String,
    pub ref_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for the blobs table.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = blobs)]
pub struct NewBlobRow {
    pub hash: String,
    pub size: i64,
    pub content_type: String,
    pub storage_location: String,
    pub ref_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for the file_references table.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = file_references)]
pub struct NewFileReferenceRow {
    pub id: uuid::Uuid,
    pub name: String,
    pub blob_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A file reference joined with its blob's size and content type.
#[derive(Debug, Clone, Queryable)]
pub struct ResolvedFileRow {
    pub id: uuid::Uuid,
    pub name: String,
    pub blob_hash: String,
    pub created_at: DateTime<Utc>,
    pub size: i64,
    pub content_type: String,
}

fn to_i64(value: u64, what: &str) -> MetadataResult<i64> {
    i64::try_from(value).map_err(|_| {
        MetadataError::new(MetadataErrorKind::Serialization(format!(
            "{} {} exceeds BIGINT",
            what, value
        )))
    })
}

fn to_u64(value: i64, what: &str) -> MetadataResult<u64> {
    u64::try_from(value).map_err(|_| {
        MetadataError::new(MetadataErrorKind::Serialization(format!(
            "negative {} {}",
            what, value
        )))
    })
}

impl NewBlobRow {
    /// Row for a freshly committed blob with one reference.
    pub fn from_new(blob: &NewBlob, now: DateTime<Utc>) -> MetadataResult<Self> {
        Ok(Self {
            hash: blob.hash.as_str().to_string(),
            size: to_i64(blob.size, "size")?,
            content_type: blob.content_type.clone(),
            storage_location: blob.storage_location.clone(),
            ref_count: 1,
            created_at: now,
            updated_at: now,
        })
    }
}

impl TryFrom<BlobRow> for Blob {
    type Error = MetadataError;

    fn try_from(row: BlobRow) -> MetadataResult<Self> {
        Ok(Blob {
            hash: ContentHash::from_trusted(row.hash),
            size: to_u64(row.size, "size")?,
            content_type: row.content_type,
            storage_location: row.storage_location,
            ref_count: to_u64(row.ref_count, "ref_count")?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&NewFileReference> for NewFileReferenceRow {
    fn from(file: &NewFileReference) -> Self {
        Self {
            id: *file.id.as_uuid(),
            name: file.name.clone(),
            blob_hash: file.hash.as_str().to_string(),
            created_at: file.created_at,
        }
    }
}

impl TryFrom<ResolvedFileRow> for FileReference {
    type Error = MetadataError;

    fn try_from(row: ResolvedFileRow) -> MetadataResult<Self> {
        Ok(FileReference {
            id: FileId::from(row.id),
            name: row.name,
            hash: ContentHash::from_trusted(row.blob_hash),
            created_at: row.created_at,
            size: to_u64(row.size, "size")?,
            content_type: row.content_type,
        })
    }
}
