//! Candidate-location ownership for in-progress uploads.
//!
//! Every upload writes to a fresh candidate location before any metadata
//! exists. [`PendingUpload`] owns that location until the upload commits. On
//! an explicit failure the engine awaits [`PendingUpload::rollback`]; if the
//! `store` future is dropped instead, `Drop` spawns the same compensation on
//! the current runtime.

use blobvault_core::{Blob, ContentHash};
use blobvault_metadata::MetadataStore;
use blobvault_storage::StorageBackend;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Candidate locations that are written but not yet committed or discarded.
///
/// The sweep consults this set so it never mistakes a live upload for an
/// orphan.
#[derive(Debug, Clone, Default)]
pub(crate) struct InFlight {
    locations: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.locations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, location: &str) {
        self.lock().insert(location.to_string());
    }

    fn release(&self, location: &str) {
        self.lock().remove(location);
    }

    pub(crate) fn snapshot(&self) -> HashSet<String> {
        self.lock().clone()
    }
}

/// How far an upload got before it has to be undone.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Stage {
    /// Only the candidate object exists.
    Written,
    /// The upload holds one reference on `hash`.
    Referenced(ContentHash),
}

/// Guard over one upload's candidate location and, once taken, its blob
/// reference.
pub(crate) struct PendingUpload {
    backend: Arc<dyn StorageBackend>,
    metadata: Arc<dyn MetadataStore>,
    in_flight: InFlight,
    location: String,
    stage: Stage,
    armed: bool,
}

impl PendingUpload {
    pub(crate) fn new(
        backend: Arc<dyn StorageBackend>,
        metadata: Arc<dyn MetadataStore>,
        in_flight: InFlight,
        location: String,
    ) -> Self {
        in_flight.register(&location);
        Self {
            backend,
            metadata,
            in_flight,
            location,
            stage: Stage::Written,
            armed: true,
        }
    }

    pub(crate) fn location(&self) -> &str {
        &self.location
    }

    /// Record that the upload now owns one reference on `hash`.
    pub(crate) fn referenced(&mut self, hash: ContentHash) {
        self.stage = Stage::Referenced(hash);
    }

    /// The upload is durable; nothing will be undone.
    pub(crate) fn commit(mut self) {
        self.armed = false;
    }

    /// Undo everything this upload did.
    ///
    /// # Errors
    ///
    /// Returns a description of the state left behind when the metadata could
    /// not be put back or the candidate object could not be deleted.
    pub(crate) async fn rollback(mut self) -> Result<(), String> {
        self.armed = false;
        compensate(
            self.backend.clone(),
            self.metadata.clone(),
            self.location.clone(),
            self.stage.clone(),
        )
        .await
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        self.in_flight.release(&self.location);
        if !self.armed {
            return;
        }

        let backend = self.backend.clone();
        let metadata = self.metadata.clone();
        let location = self.location.clone();
        let stage = self.stage.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(location = %location, "Upload cancelled, cleaning up candidate");
                handle.spawn(async move {
                    if let Err(reason) = compensate(backend, metadata, location.clone(), stage).await
                    {
                        tracing::error!(location = %location, reason = %reason, "Cancelled upload left records behind");
                    }
                });
            }
            Err(_) => {
                tracing::error!(location = %location, "Upload dropped outside a runtime; candidate left for sweep");
            }
        }
    }
}

async fn compensate(
    backend: Arc<dyn StorageBackend>,
    metadata: Arc<dyn MetadataStore>,
    location: String,
    stage: Stage,
) -> Result<(), String> {
    match stage {
        Stage::Written => discard_candidate(backend.as_ref(), &location).await,
        Stage::Referenced(hash) => {
            let blob = metadata.decrement_blob_ref(&hash).await.map_err(|e| {
                format!("blob {} keeps a reference nobody owns: {}", hash, e)
            })?;
            tracing::debug!(hash = %hash, remaining = blob.ref_count, "Released upload reference");

            if blob.is_retired() {
                if let Err(reason) = reclaim(backend.as_ref(), metadata.as_ref(), &blob).await {
                    tracing::warn!(hash = %hash, reason = %reason, "Reclaim deferred to sweep");
                }
            }
            // The candidate may differ from the blob's location on a hit.
            if blob.storage_location != location {
                discard_candidate(backend.as_ref(), &location).await?;
            }
            Ok(())
        }
    }
}

/// Delete a candidate object that no blob record points at.
///
/// # Errors
///
/// Returns a description of the orphaned object when the delete fails.
pub(crate) async fn discard_candidate(
    backend: &dyn StorageBackend,
    location: &str,
) -> Result<(), String> {
    backend.delete(location).await.map_err(|e| {
        tracing::warn!(location, error = %e, "Failed to discard candidate object");
        format!("orphaned object at {} has no blob record: {}", location, e)
    })
}

/// Delete a retired blob's object and then its record.
///
/// Returns `Ok(false)` when the record was revived in the meantime; a revived
/// record points at a different location, so deleting the old object is still
/// correct.
///
/// # Errors
///
/// Returns the reason the reclaim could not finish.
pub(crate) async fn reclaim(
    backend: &dyn StorageBackend,
    metadata: &dyn MetadataStore,
    blob: &Blob,
) -> Result<bool, String> {
    backend
        .delete(&blob.storage_location)
        .await
        .map_err(|e| format!("deleting object failed: {}", e))?;

    let deleted = metadata
        .delete_blob(&blob.hash, &blob.storage_location)
        .await
        .map_err(|e| format!("deleting record failed: {}", e))?;

    if deleted {
        tracing::info!(hash = %blob.hash, location = %blob.storage_location, "Reclaimed blob");
    } else {
        tracing::debug!(hash = %blob.hash, "Blob revived before reclaim");
    }
    Ok(deleted)
}
