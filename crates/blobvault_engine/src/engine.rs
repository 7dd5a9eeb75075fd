//! The deduplication engine.

use crate::EngineConfig;
use crate::pending::{InFlight, PendingUpload, discard_candidate, reclaim};
use blobvault_core::{
    Blob, ContentHash, ContentHasher, CreateBlobOutcome, FileId, FileReference, NewBlob,
    NewFileReference, UploadRequest,
};
use blobvault_error::{EngineError, EngineErrorKind, EngineResult, MetadataError};
use blobvault_metadata::MetadataStore;
use blobvault_storage::{ByteStream, StorageBackend};
use futures::TryStreamExt;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// What happened to the blob behind a removed file reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemoveOutcome {
    /// Other references still point at the blob.
    Released {
        /// References left after this removal
        remaining: u64,
    },
    /// The last reference went away; object and record are gone.
    Reclaimed,
    /// The last reference went away but cleanup did not finish.
    /// The blob is retired and the sweep will reclaim it.
    ReclaimPending {
        /// The retired blob
        hash: ContentHash,
        /// Why cleanup stopped
        reason: String,
    },
}

/// Content-addressed store with reference counting.
///
/// Uploads are written once per unique SHA-256; every further upload of the
/// same bytes only adds a reference. The engine keeps no persistent state of
/// its own and is shared across tasks behind an `Arc`.
///
/// # Example
///
/// ```
/// use blobvault_core::UploadRequest;
/// use blobvault_engine::{DedupEngine, EngineConfig};
/// use blobvault_metadata::InMemoryMetadataStore;
/// use blobvault_storage::{FileSystemBackend, collect_stream, stream_from_bytes};
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let dir = tempfile::tempdir().unwrap();
/// let engine = DedupEngine::new(
///     Arc::new(FileSystemBackend::new(dir.path()).await.unwrap()),
///     Arc::new(InMemoryMetadataStore::new()),
///     EngineConfig::default(),
/// );
///
/// let file = engine
///     .store(
///         UploadRequest::new("a.txt", 13, "text/plain"),
///         stream_from_bytes(&b"Hello, World!"[..]),
///     )
///     .await
///     .unwrap();
///
/// let (body, _) = engine.fetch(&file.id).await.unwrap();
/// assert_eq!(collect_stream(body).await.unwrap(), b"Hello, World!");
/// # });
/// ```
pub struct DedupEngine {
    backend: Arc<dyn StorageBackend>,
    metadata: Arc<dyn MetadataStore>,
    config: EngineConfig,
    in_flight: InFlight,
}

impl std::fmt::Debug for DedupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupEngine")
            .field("backend", &self.backend.backend_name())
            .field("config", &self.config)
            .finish()
    }
}

impl DedupEngine {
    /// Create an engine over a backend and a metadata store.
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        metadata: Arc<dyn MetadataStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            backend,
            metadata,
            config,
            in_flight: InFlight::default(),
        }
    }

    /// The object backend.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// The metadata store.
    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// Engine settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// `{prefix}/{id[0:2]}/{id[2:4]}/{id}` for a fresh random id.
    fn candidate_location(&self) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "{}/{}/{}/{}",
            self.config.location_prefix().trim_end_matches('/'),
            &id[0..2],
            &id[2..4],
            id
        )
    }

    /// Store an upload and return the file reference created for it.
    ///
    /// The body is written to a fresh candidate location while its SHA-256
    /// and length are computed in the same pass. New content becomes a blob at
    /// that location; known content gains a reference and the candidate is
    /// discarded. Either way exactly one new file reference is created.
    ///
    /// # Errors
    ///
    /// - `ContentRejected` if the received length differs from the declared one
    /// - `InvalidPath` if the candidate location is refused by the backend
    /// - `BackendUnavailable` if the object or its records cannot be written
    /// - `StoreCorruption` if a failed upload could not be rolled back
    #[tracing::instrument(
        skip(self, request, body),
        fields(
            name = %request.name(),
            declared_size = *request.declared_size(),
            hash = tracing::field::Empty
        )
    )]
    pub async fn store(
        &self,
        request: UploadRequest,
        body: ByteStream,
    ) -> EngineResult<FileReference> {
        let declared = *request.declared_size();
        let pending = PendingUpload::new(
            self.backend.clone(),
            self.metadata.clone(),
            self.in_flight.clone(),
            self.candidate_location(),
        );

        let hasher = Arc::new(Mutex::new(ContentHasher::new()));
        let body_failed = Arc::new(AtomicBool::new(false));
        let tapped: ByteStream = {
            let hasher = hasher.clone();
            let body_failed = body_failed.clone();
            Box::pin(
                body.inspect_ok(move |chunk| {
                    hasher
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .update(chunk);
                })
                .inspect_err(move |_| body_failed.store(true, Ordering::SeqCst)),
            )
        };

        let written = self.backend.put(pending.location(), tapped, declared).await;
        let hasher = std::mem::take(
            &mut *hasher
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        let observed = hasher.bytes_seen();

        let written = match written {
            Ok(written) => written,
            Err(e) if body_failed.load(Ordering::SeqCst) => {
                tracing::warn!(observed, error = %e, "Upload stream failed");
                self.abandon(pending).await?;
                return Err(EngineError::new(EngineErrorKind::ContentRejected {
                    declared,
                    observed,
                }));
            }
            Err(e) => {
                tracing::error!(error = %e, "Candidate write failed");
                self.abandon(pending).await?;
                return Err(e.into());
            }
        };

        if observed != declared || written != observed {
            tracing::warn!(observed, written, "Size mismatch, rejecting upload");
            self.abandon(pending).await?;
            let observed = if observed != declared { observed } else { written };
            return Err(EngineError::new(EngineErrorKind::ContentRejected {
                declared,
                observed,
            }));
        }

        let hash = hasher.finalize();
        tracing::Span::current().record("hash", tracing::field::display(&hash));

        let (pending, blob) = self
            .commit_blob(pending, &hash, observed, request.content_type())
            .await?;

        match self
            .metadata
            .create_file_reference(NewFileReference::new(request.name().clone(), hash))
            .await
        {
            Ok(file) => {
                pending.commit();
                tracing::info!(
                    file_id = %file.id,
                    hash = %file.hash,
                    size = file.size,
                    ref_count = blob.ref_count,
                    "Stored file"
                );
                Ok(file)
            }
            Err(e) => {
                tracing::error!(error = %e, "File reference creation failed");
                Err(self.undo(pending, e).await)
            }
        }
    }

    /// Turn the written candidate into one reference on a blob.
    ///
    /// A miss creates the blob at the candidate location. A hit increments
    /// the live blob and discards the candidate. If the live blob is retired
    /// between the two steps, the cycle is retried.
    async fn commit_blob(
        &self,
        mut pending: PendingUpload,
        hash: &ContentHash,
        size: u64,
        content_type: &str,
    ) -> EngineResult<(PendingUpload, Blob)> {
        let new_blob = NewBlob {
            hash: hash.clone(),
            size,
            content_type: content_type.to_string(),
            storage_location: pending.location().to_string(),
        };
        let max_attempts = (*self.config.max_commit_attempts()).max(1);

        for attempt in 1..=max_attempts {
            match self.metadata.create_blob(new_blob.clone()).await {
                Ok(CreateBlobOutcome::Created(blob)) => {
                    pending.referenced(hash.clone());
                    tracing::debug!(location = %blob.storage_location, "New blob");
                    return Ok((pending, blob));
                }
                Ok(CreateBlobOutcome::Existing(_)) => {
                    match self.metadata.increment_blob_ref(hash).await {
                        Ok(blob) => {
                            pending.referenced(hash.clone());
                            if let Err(reason) =
                                discard_candidate(self.backend.as_ref(), pending.location()).await
                            {
                                return Err(self.orphaned_duplicate(pending, reason).await);
                            }
                            tracing::debug!(ref_count = blob.ref_count, "Duplicate content");
                            return Ok((pending, blob));
                        }
                        Err(e) if e.is_not_found() => {
                            tracing::debug!(attempt, "Blob retired before increment, retrying");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Increment failed");
                            self.abandon(pending).await?;
                            return Err(metadata_unavailable(e));
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Blob creation failed");
                    self.abandon(pending).await?;
                    return Err(metadata_unavailable(e));
                }
            }
        }

        self.abandon(pending).await?;
        Err(EngineError::new(EngineErrorKind::BackendUnavailable(format!(
            "blob {} kept retiring across {} attempts",
            hash, max_attempts
        ))))
    }

    /// Roll back an upload that holds no blob reference.
    async fn abandon(&self, pending: PendingUpload) -> EngineResult<()> {
        pending.rollback().await.map_err(|reason| {
            tracing::error!(reason = %reason, "Rollback failed");
            EngineError::new(EngineErrorKind::StoreCorruption(reason))
        })
    }

    /// Give back the reference taken on a hit whose candidate could not be
    /// deleted. The rollback retries the delete once.
    async fn orphaned_duplicate(&self, pending: PendingUpload, reason: String) -> EngineError {
        match pending.rollback().await {
            Ok(()) => EngineError::new(EngineErrorKind::BackendUnavailable(reason)),
            Err(rollback) => {
                tracing::error!(reason = %rollback, "Duplicate upload left its candidate behind");
                EngineError::new(EngineErrorKind::StoreCorruption(rollback))
            }
        }
    }

    /// Roll back an upload after a metadata failure, returning the error to report.
    async fn undo(&self, pending: PendingUpload, cause: MetadataError) -> EngineError {
        match pending.rollback().await {
            Ok(()) => metadata_unavailable(cause),
            Err(reason) => {
                tracing::error!(reason = %reason, cause = %cause, "Rollback failed");
                EngineError::new(EngineErrorKind::StoreCorruption(format!(
                    "{}; rollback failed: {}",
                    cause, reason
                )))
            }
        }
    }

    /// Open a read stream for a file reference.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the reference, its blob or the physical object is missing,
    ///   or the blob is retired
    /// - `BackendUnavailable` if the stream cannot be opened
    #[tracing::instrument(skip(self), fields(file_id = %id))]
    pub async fn fetch(&self, id: &FileId) -> EngineResult<(ByteStream, FileReference)> {
        let file = self
            .metadata
            .get_file_reference(id)
            .await
            .map_err(metadata_unavailable)?
            .ok_or_else(|| not_found(id))?;

        let blob = self
            .metadata
            .get_blob(&file.hash)
            .await
            .map_err(metadata_unavailable)?
            .filter(|blob| !blob.is_retired())
            .ok_or_else(|| {
                tracing::warn!(hash = %file.hash, "Reference points at a missing or retired blob");
                not_found(id)
            })?;

        let body = self.backend.get(&blob.storage_location).await?;
        tracing::debug!(hash = %blob.hash, size = blob.size, "Opened read stream");
        Ok((body, file))
    }

    /// Remove a file reference and release its blob reference.
    ///
    /// When the last reference goes, the physical object and then the blob
    /// record are deleted. Cleanup failures are reported through
    /// [`RemoveOutcome::ReclaimPending`], never as an error.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the reference does not exist
    /// - `BackendUnavailable` if the metadata store fails
    /// - `StoreCorruption` if a failed decrement could not be undone
    #[tracing::instrument(skip(self), fields(file_id = %id))]
    pub async fn remove(&self, id: &FileId) -> EngineResult<RemoveOutcome> {
        let file = self
            .metadata
            .get_file_reference(id)
            .await
            .map_err(metadata_unavailable)?
            .ok_or_else(|| not_found(id))?;

        if !self
            .metadata
            .delete_file_reference(id)
            .await
            .map_err(metadata_unavailable)?
        {
            return Err(not_found(id));
        }

        let decremented = self.metadata.decrement_blob_ref(&file.hash).await;
        let blob = match decremented {
            Ok(blob) => blob,
            Err(e) => {
                tracing::error!(hash = %file.hash, error = %e, "Decrement failed, restoring reference");
                let restore = NewFileReference {
                    id: file.id,
                    name: file.name,
                    hash: file.hash,
                    created_at: file.created_at,
                };
                return Err(match self.metadata.create_file_reference(restore).await {
                    Ok(_) => metadata_unavailable(e),
                    Err(restore_err) => {
                        tracing::error!(error = %restore_err, "Reference restore failed");
                        EngineError::new(EngineErrorKind::StoreCorruption(format!(
                            "file {} deleted without releasing its blob: {}",
                            id, restore_err
                        )))
                    }
                });
            }
        };

        if !blob.is_retired() {
            tracing::info!(hash = %blob.hash, remaining = blob.ref_count, "Released reference");
            return Ok(RemoveOutcome::Released {
                remaining: blob.ref_count,
            });
        }

        match reclaim(self.backend.as_ref(), self.metadata.as_ref(), &blob).await {
            Ok(_) => Ok(RemoveOutcome::Reclaimed),
            Err(reason) => {
                tracing::warn!(hash = %blob.hash, reason = %reason, "Reclaim pending");
                Ok(RemoveOutcome::ReclaimPending {
                    hash: blob.hash,
                    reason,
                })
            }
        }
    }

    /// All file references, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the metadata store fails.
    #[tracing::instrument(skip(self))]
    pub async fn enumerate(&self) -> EngineResult<Vec<FileReference>> {
        self.metadata
            .list_file_references()
            .await
            .map_err(metadata_unavailable)
    }
}

fn not_found(id: &FileId) -> EngineError {
    EngineError::new(EngineErrorKind::NotFound(format!("file {}", id)))
}

/// Metadata failures inside an operation are server-side, whatever their kind.
pub(crate) fn metadata_unavailable(err: MetadataError) -> EngineError {
    EngineError::new(EngineErrorKind::BackendUnavailable(err.to_string()))
}
