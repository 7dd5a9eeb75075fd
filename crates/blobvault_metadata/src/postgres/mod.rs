//! PostgreSQL metadata store.
//!
//! Diesel is synchronous, so every operation checks a connection out of an
//! r2d2 pool inside `spawn_blocking`. Reference counts change through
//! conditional `UPDATE ... WHERE ref_count > 0 RETURNING *` statements;
//! blob creation takes a row lock with `SELECT ... FOR UPDATE` when the hash
//! already exists.

mod models;
pub mod schema;

use crate::MetadataStore;
use async_trait::async_trait;
use blobvault_core::{
    Blob, ContentHash, CreateBlobOutcome, FileId, FileReference, NewBlob, NewFileReference,
};
use blobvault_error::{MetadataError, MetadataErrorKind, MetadataResult};
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use models::{BlobRow, NewBlobRow, NewFileReferenceRow, ResolvedFileRow};
use schema::{blobs, file_references};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Connection pool type used by [`PostgresMetadataStore`].
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Run pending migrations.
pub fn run_migrations(conn: &mut PgConnection) -> MetadataResult<()> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|e| MetadataError::new(MetadataErrorKind::Migration(e.to_string())))
}

/// Database-backed metadata store.
#[derive(Clone)]
pub struct PostgresMetadataStore {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresMetadataStore")
            .field("max_size", &self.pool.max_size())
            .finish()
    }
}

impl PostgresMetadataStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool for `database_url` and bring the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns error if the pool cannot be built or migrations fail.
    #[tracing::instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> MetadataResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = tokio::task::spawn_blocking(move || {
            Pool::builder()
                .max_size(max_connections.max(1))
                .build(manager)
        })
        .await
        .map_err(|e| MetadataError::new(MetadataErrorKind::Connection(e.to_string())))??;

        let store = Self::new(pool);
        store.with_conn(run_migrations).await?;

        tracing::info!(max_connections, "Connected PostgreSQL metadata store");
        Ok(store)
    }

    /// Run `op` on a pooled connection off the async runtime.
    async fn with_conn<T, F>(&self, op: F) -> MetadataResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> MetadataResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            op(&mut *conn)
        })
        .await
        .map_err(|e| MetadataError::new(MetadataErrorKind::Query(e.to_string())))?
    }
}

fn resolved_columns() -> (
    file_references::id,
    file_references::name,
    file_references::blob_hash,
    file_references::created_at,
    blobs::size,
    blobs::content_type,
) {
    (
        file_references::id,
        file_references::name,
        file_references::blob_hash,
        file_references::created_at,
        blobs::size,
        blobs::content_type,
    )
}

#[async_trait]
impl MetadataStore for PostgresMetadataStore {
    async fn get_blob(&self, hash: &ContentHash) -> MetadataResult<Option<Blob>> {
        let hash = hash.as_str().to_string();
        self.with_conn(move |conn| {
            blobs::table
                .find(hash)
                .select(BlobRow::as_select())
                .first(conn)
                .optional()?
                .map(Blob::try_from)
                .transpose()
        })
        .await
    }

    #[tracing::instrument(skip(self, blob), fields(hash = %blob.hash))]
    async fn create_blob(&self, blob: NewBlob) -> MetadataResult<CreateBlobOutcome> {
        self.with_conn(move |conn| {
            let now = Utc::now();
            let row = NewBlobRow::from_new(&blob, now)?;

            conn.transaction::<_, MetadataError, _>(|conn| {
                let inserted = diesel::insert_into(blobs::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .returning(BlobRow::as_returning())
                    .get_result(conn)
                    .optional()?;
                if let Some(created) = inserted {
                    return Ok(CreateBlobOutcome::Created(created.try_into()?));
                }

                let existing = blobs::table
                    .find(row.hash.as_str())
                    .select(BlobRow::as_select())
                    .for_update()
                    .first(conn)
                    .optional()?;

                match existing {
                    Some(live) if live.ref_count > 0 => {
                        Ok(CreateBlobOutcome::Existing(live.try_into()?))
                    }
                    Some(_) => {
                        tracing::debug!("Reviving retired blob");
                        let revived = diesel::update(blobs::table.find(row.hash.as_str()))
                            .set((
                                blobs::size.eq(row.size),
                                blobs::content_type.eq(row.content_type.as_str()),
                                blobs::storage_location.eq(row.storage_location.as_str()),
                                blobs::ref_count.eq(1i64),
                                blobs::updated_at.eq(now),
                            ))
                            .returning(BlobRow::as_returning())
                            .get_result(conn)?;
                        Ok(CreateBlobOutcome::Created(revived.try_into()?))
                    }
                    // Deleted between the insert and the lock; insert again.
                    None => {
                        let created = diesel::insert_into(blobs::table)
                            .values(&row)
                            .returning(BlobRow::as_returning())
                            .get_result(conn)?;
                        Ok(CreateBlobOutcome::Created(created.try_into()?))
                    }
                }
            })
        })
        .await
    }

    async fn increment_blob_ref(&self, hash: &ContentHash) -> MetadataResult<Blob> {
        let hash = hash.as_str().to_string();
        self.with_conn(move |conn| {
            let row = diesel::update(
                blobs::table
                    .filter(blobs::hash.eq(hash.as_str()))
                    .filter(blobs::ref_count.gt(0i64)),
            )
            .set((
                blobs::ref_count.eq(blobs::ref_count + 1i64),
                blobs::updated_at.eq(Utc::now()),
            ))
            .returning(BlobRow::as_returning())
            .get_result(conn)?;
            Blob::try_from(row)
        })
        .await
    }

    async fn decrement_blob_ref(&self, hash: &ContentHash) -> MetadataResult<Blob> {
        let hash = hash.as_str().to_string();
        self.with_conn(move |conn| {
            let row = diesel::update(
                blobs::table
                    .filter(blobs::hash.eq(hash.as_str()))
                    .filter(blobs::ref_count.gt(0i64)),
            )
            .set((
                blobs::ref_count.eq(blobs::ref_count - 1i64),
                blobs::updated_at.eq(Utc::now()),
            ))
            .returning(BlobRow::as_returning())
            .get_result(conn)?;
            Blob::try_from(row)
        })
        .await
    }

    async fn delete_blob(
        &self,
        hash: &ContentHash,
        expected_location: &str,
    ) -> MetadataResult<bool> {
        let hash = hash.as_str().to_string();
        let expected_location = expected_location.to_string();
        self.with_conn(move |conn| {
            let deleted = diesel::delete(
                blobs::table
                    .filter(blobs::hash.eq(hash.as_str()))
                    .filter(blobs::ref_count.eq(0i64))
                    .filter(blobs::storage_location.eq(expected_location.as_str())),
            )
            .execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn list_blobs(&self) -> MetadataResult<Vec<Blob>> {
        self.with_conn(|conn| {
            blobs::table
                .order((blobs::created_at.asc(), blobs::hash.asc()))
                .select(BlobRow::as_select())
                .load(conn)?
                .into_iter()
                .map(Blob::try_from)
                .collect()
        })
        .await
    }

    #[tracing::instrument(skip(self, file), fields(file_id = %file.id, hash = %file.hash))]
    async fn create_file_reference(
        &self,
        file: NewFileReference,
    ) -> MetadataResult<FileReference> {
        let row = NewFileReferenceRow::from(&file);
        self.with_conn(move |conn| {
            conn.transaction::<_, MetadataError, _>(|conn| {
                diesel::insert_into(file_references::table)
                    .values(&row)
                    .execute(conn)?;

                let resolved: ResolvedFileRow = file_references::table
                    .inner_join(blobs::table)
                    .filter(file_references::id.eq(row.id))
                    .select(resolved_columns())
                    .first(conn)?;
                FileReference::try_from(resolved)
            })
        })
        .await
    }

    async fn get_file_reference(&self, id: &FileId) -> MetadataResult<Option<FileReference>> {
        let id = *id.as_uuid();
        self.with_conn(move |conn| {
            file_references::table
                .inner_join(blobs::table)
                .filter(file_references::id.eq(id))
                .select(resolved_columns())
                .first::<ResolvedFileRow>(conn)
                .optional()?
                .map(FileReference::try_from)
                .transpose()
        })
        .await
    }

    async fn get_blob_hash_for_file_reference(
        &self,
        id: &FileId,
    ) -> MetadataResult<Option<ContentHash>> {
        let id = *id.as_uuid();
        self.with_conn(move |conn| {
            let hash = file_references::table
                .find(id)
                .select(file_references::blob_hash)
                .first::<String>(conn)
                .optional()?;
            Ok(hash.map(ContentHash::from_trusted))
        })
        .await
    }

    async fn delete_file_reference(&self, id: &FileId) -> MetadataResult<bool> {
        let id = *id.as_uuid();
        self.with_conn(move |conn| {
            let deleted = diesel::delete(file_references::table.find(id)).execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn list_file_references(&self) -> MetadataResult<Vec<FileReference>> {
        self.with_conn(|conn| {
            file_references::table
                .inner_join(blobs::table)
                .order(file_references::created_at.desc())
                .select(resolved_columns())
                .load::<ResolvedFileRow>(conn)?
                .into_iter()
                .map(FileReference::try_from)
                .collect()
        })
        .await
    }
}
