//! Read-through cache in front of a metadata store.

use crate::MetadataStore;
use async_trait::async_trait;
use blobvault_cache::{Cache, CacheConfig};
use blobvault_core::{
    Blob, ContentHash, CreateBlobOutcome, FileId, FileReference, NewBlob, NewFileReference,
};
use blobvault_error::MetadataResult;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Cache key for the full file listing.
pub const FILE_LIST_KEY: &str = "file_list";

/// Cache key for a single file reference.
pub fn file_key(id: &FileId) -> String {
    format!("file:{}", id)
}

/// Decorator that caches file-reference reads.
///
/// Successful lookups populate `file:{id}`, listings populate `file_list`.
/// Creating a reference invalidates the listing; deleting one invalidates
/// both its own entry and the listing. Blob operations always go straight to
/// the inner store.
///
/// Every mutation bumps an epoch after it commits. A read that populates the
/// cache checks the epoch afterwards and drops its own entry when a mutation
/// landed in between, so a slow read never outlives a concurrent delete.
pub struct CachedMetadataStore<S> {
    inner: S,
    cache: Arc<dyn Cache>,
    file_ttl: Duration,
    list_ttl: Duration,
    epoch: AtomicU64,
}

impl<S: MetadataStore> CachedMetadataStore<S> {
    /// Wrap `inner` with explicit TTLs.
    pub fn new(inner: S, cache: Arc<dyn Cache>, file_ttl: Duration, list_ttl: Duration) -> Self {
        Self {
            inner,
            cache,
            file_ttl,
            list_ttl,
            epoch: AtomicU64::new(0),
        }
    }

    /// Wrap `inner` using the TTLs from a cache configuration.
    pub fn from_config(inner: S, cache: Arc<dyn Cache>, config: &CacheConfig) -> Self {
        Self::new(inner, cache, config.file_ttl(), config.list_ttl())
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Decode a cached value, dropping entries that no longer deserialize.
    fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.get(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => {
                tracing::debug!(key, "Cache hit");
                Some(decoded)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                self.cache.invalidate(key);
                None
            }
        }
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Invalidate `keys` after a committed mutation.
    fn mutated(&self, keys: &[&str]) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        for key in keys {
            self.cache.invalidate(key);
        }
    }

    /// Populate `key` with a value read while the epoch was `read_epoch`.
    fn store<T: serde::Serialize>(&self, key: &str, value: &T, ttl: Duration, read_epoch: u64) {
        if self.current_epoch() != read_epoch {
            tracing::debug!(key, "Skipping cache population after concurrent mutation");
            return;
        }
        match serde_json::to_value(value) {
            Ok(json) => self.cache.set(key, json, ttl),
            Err(e) => {
                tracing::warn!(key, error = %e, "Skipping cache population");
                return;
            }
        }
        // A mutation may have invalidated between the check and the set.
        if self.current_epoch() != read_epoch {
            self.cache.invalidate(key);
        }
    }
}

#[async_trait]
impl<S: MetadataStore> MetadataStore for CachedMetadataStore<S> {
    async fn get_blob(&self, hash: &ContentHash) -> MetadataResult<Option<Blob>> {
        self.inner.get_blob(hash).await
    }

    async fn create_blob(&self, blob: NewBlob) -> MetadataResult<CreateBlobOutcome> {
        self.inner.create_blob(blob).await
    }

    async fn increment_blob_ref(&self, hash: &ContentHash) -> MetadataResult<Blob> {
        self.inner.increment_blob_ref(hash).await
    }

    async fn decrement_blob_ref(&self, hash: &ContentHash) -> MetadataResult<Blob> {
        self.inner.decrement_blob_ref(hash).await
    }

    async fn delete_blob(
        &self,
        hash: &ContentHash,
        expected_location: &str,
    ) -> MetadataResult<bool> {
        self.inner.delete_blob(hash, expected_location).await
    }

    async fn list_blobs(&self) -> MetadataResult<Vec<Blob>> {
        self.inner.list_blobs().await
    }

    async fn create_file_reference(
        &self,
        file: NewFileReference,
    ) -> MetadataResult<FileReference> {
        let created = self.inner.create_file_reference(file).await?;
        self.mutated(&[FILE_LIST_KEY]);
        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(file_id = %id))]
    async fn get_file_reference(&self, id: &FileId) -> MetadataResult<Option<FileReference>> {
        let key = file_key(id);
        if let Some(file) = self.cached::<FileReference>(&key) {
            return Ok(Some(file));
        }

        tracing::debug!("Cache miss");
        let read_epoch = self.current_epoch();
        let file = self.inner.get_file_reference(id).await?;
        if let Some(found) = &file {
            self.store(&key, found, self.file_ttl, read_epoch);
        }
        Ok(file)
    }

    async fn get_blob_hash_for_file_reference(
        &self,
        id: &FileId,
    ) -> MetadataResult<Option<ContentHash>> {
        self.inner.get_blob_hash_for_file_reference(id).await
    }

    async fn delete_file_reference(&self, id: &FileId) -> MetadataResult<bool> {
        let result = self.inner.delete_file_reference(id).await;
        self.mutated(&[file_key(id).as_str(), FILE_LIST_KEY]);
        result
    }

    #[tracing::instrument(skip(self))]
    async fn list_file_references(&self) -> MetadataResult<Vec<FileReference>> {
        if let Some(files) = self.cached::<Vec<FileReference>>(FILE_LIST_KEY) {
            return Ok(files);
        }

        tracing::debug!("Cache miss");
        let read_epoch = self.current_epoch();
        let files = self.inner.list_file_references().await?;
        self.store(FILE_LIST_KEY, &files, self.list_ttl, read_epoch);
        Ok(files)
    }
}
