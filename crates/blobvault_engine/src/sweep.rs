//! Out-of-band reconciliation between backend objects and blob records.
//!
//! Normal operation can leave two kinds of debris: candidate objects whose
//! upload died before committing or discarding them (orphans), and retired
//! blobs whose cleanup was interrupted (see
//! [`RemoveOutcome::ReclaimPending`](crate::RemoveOutcome::ReclaimPending)).

use crate::DedupEngine;
use crate::engine::metadata_unavailable;
use crate::pending::reclaim;
use blobvault_core::ContentHash;
use blobvault_error::EngineResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What a sweep is allowed to delete. The default only reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepOptions {
    /// Delete objects that no blob record points at
    pub delete_orphans: bool,
    /// Reclaim blobs whose reference count is zero
    pub reclaim_retired: bool,
}

/// Findings of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Objects found under the location prefix
    pub objects_scanned: usize,
    /// Blob records examined
    pub blobs_scanned: usize,
    /// Objects with no blob record and no upload in progress
    pub orphans: Vec<String>,
    /// Orphans actually deleted
    pub orphans_deleted: usize,
    /// Blobs found with a zero reference count
    pub retired: Vec<ContentHash>,
    /// Retired blobs reclaimed
    pub reclaimed: usize,
    /// Live blobs whose object is missing from the backend
    pub missing_objects: Vec<ContentHash>,
    /// Cleanup steps that failed, one line each
    pub failures: Vec<String>,
}

impl SweepReport {
    /// Nothing to report.
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty()
            && self.retired.is_empty()
            && self.missing_objects.is_empty()
            && self.failures.is_empty()
    }
}

impl DedupEngine {
    /// Compare backend objects against blob records and optionally clean up.
    ///
    /// Objects are listed before the in-flight set is read and blob records
    /// are listed after it, so an upload that commits while the sweep runs is
    /// always covered by one of the two.
    ///
    /// # Errors
    ///
    /// Returns an error only if the listing itself fails. Individual cleanup
    /// failures are collected in [`SweepReport::failures`].
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self, options: SweepOptions) -> EngineResult<SweepReport> {
        let prefix = self.config().location_prefix().trim_end_matches('/');
        let objects = self.backend().list(prefix).await?;
        let in_flight = self.in_flight().snapshot();
        let blobs = self
            .metadata()
            .list_blobs()
            .await
            .map_err(metadata_unavailable)?;

        let mut report = SweepReport {
            objects_scanned: objects.len(),
            blobs_scanned: blobs.len(),
            ..SweepReport::default()
        };

        let known: HashSet<&str> = blobs.iter().map(|b| b.storage_location.as_str()).collect();
        for object in &objects {
            if known.contains(object.as_str()) || in_flight.contains(object) {
                continue;
            }
            report.orphans.push(object.clone());
            if options.delete_orphans {
                match self.backend().delete(object).await {
                    Ok(()) => report.orphans_deleted += 1,
                    Err(e) => report.failures.push(format!("orphan {}: {}", object, e)),
                }
            }
        }

        let present: HashSet<&str> = objects.iter().map(String::as_str).collect();
        for blob in &blobs {
            if blob.is_retired() {
                report.retired.push(blob.hash.clone());
                if options.reclaim_retired {
                    match reclaim(self.backend().as_ref(), self.metadata().as_ref(), blob).await {
                        Ok(true) => report.reclaimed += 1,
                        Ok(false) => {}
                        Err(reason) => report.failures.push(format!("blob {}: {}", blob.hash, reason)),
                    }
                }
            } else if !present.contains(blob.storage_location.as_str()) {
                tracing::warn!(hash = %blob.hash, location = %blob.storage_location, "Live blob has no object");
                report.missing_objects.push(blob.hash.clone());
            }
        }

        tracing::info!(
            objects = report.objects_scanned,
            blobs = report.blobs_scanned,
            orphans = report.orphans.len(),
            orphans_deleted = report.orphans_deleted,
            retired = report.retired.len(),
            reclaimed = report.reclaimed,
            missing = report.missing_objects.len(),
            failures = report.failures.len(),
            "Sweep finished"
        );
        Ok(report)
    }
}
