//! Tests for the caching decorator.

mod common;

use async_trait::async_trait;
use blobvault_cache::{Cache, MemoryCache};
use blobvault_core::{
    Blob, ContentHash, CreateBlobOutcome, FileId, FileReference, NewBlob, NewFileReference,
};
use blobvault_error::MetadataResult;
use blobvault_metadata::{
    CachedMetadataStore, FILE_LIST_KEY, InMemoryMetadataStore, MetadataStore, file_key,
};
use common::{new_blob, unique_hash};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Counts reads that reach the underlying store.
///
/// A non-zero `read_delay_ms` holds every file read after the inner store has
/// answered, so the answer can go stale before the decorator sees it.
#[derive(Default)]
struct CountingStore {
    inner: InMemoryMetadataStore,
    file_reads: AtomicUsize,
    list_reads: AtomicUsize,
    read_delay_ms: AtomicU64,
}

impl CountingStore {
    async fn read_delay(&self) {
        let ms = self.read_delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl MetadataStore for CountingStore {
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
    async fn delete_blob(&self, hash: &ContentHash, location: &str) -> MetadataResult<bool> {
        self.inner.delete_blob(hash, location).await
    }
    async fn list_blobs(&self) -> MetadataResult<Vec<Blob>> {
        self.inner.list_blobs().await
    }
    async fn create_file_reference(
        &self,
        file: NewFileReference,
    ) -> MetadataResult<FileReference> {
        self.inner.create_file_reference(file).await
    }
    async fn get_file_reference(&self, id: &FileId) -> MetadataResult<Option<FileReference>> {
        self.file_reads.fetch_add(1, Ordering::SeqCst);
        let file = self.inner.get_file_reference(id).await;
        self.read_delay().await;
        file
    }
    async fn get_blob_hash_for_file_reference(
        &self,
        id: &FileId,
    ) -> MetadataResult<Option<ContentHash>> {
        self.inner.get_blob_hash_for_file_reference(id).await
    }
    async fn delete_file_reference(&self, id: &FileId) -> MetadataResult<bool> {
        self.inner.delete_file_reference(id).await
    }
    async fn list_file_references(&self) -> MetadataResult<Vec<FileReference>> {
        self.list_reads.fetch_add(1, Ordering::SeqCst);
        let files = self.inner.list_file_references().await;
        self.read_delay().await;
        files
    }
}

fn cached(cache: Arc<MemoryCache>) -> CachedMetadataStore<CountingStore> {
    CachedMetadataStore::new(
        CountingStore::default(),
        cache,
        Duration::from_secs(3600),
        Duration::from_secs(600),
    )
}

async fn seed_file(store: &CachedMetadataStore<CountingStore>, name: &str) -> FileReference {
    let hash = unique_hash();
    store.create_blob(new_blob(&hash, "blobs/cached")).await.unwrap();
    store
        .create_file_reference(NewFileReference::new(name, hash))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_shares_store_contract() {
    let cache = Arc::new(MemoryCache::new(100));
    let store = cached(cache);
    common::check_ref_counting(&store).await;
    common::check_file_reference_lifecycle(&store).await;
}

#[tokio::test]
async fn test_file_lookup_is_served_from_cache() {
    let cache = Arc::new(MemoryCache::new(100));
    let store = cached(Arc::clone(&cache));
    let file = seed_file(&store, "a.txt").await;

    let first = store.get_file_reference(&file.id).await.unwrap().unwrap();
    let second = store.get_file_reference(&file.id).await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(store.inner().file_reads.load(Ordering::SeqCst), 1);
    assert!(cache.get(&file_key(&file.id)).is_some());
}

#[tokio::test]
async fn test_missing_file_is_not_cached() {
    let cache = Arc::new(MemoryCache::new(100));
    let store = cached(Arc::clone(&cache));
    let id = FileId::new();

    assert!(store.get_file_reference(&id).await.unwrap().is_none());
    assert!(store.get_file_reference(&id).await.unwrap().is_none());
    assert_eq!(store.inner().file_reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_create_invalidates_listing() {
    let cache = Arc::new(MemoryCache::new(100));
    let store = cached(Arc::clone(&cache));
    seed_file(&store, "a.txt").await;

    assert_eq!(store.list_file_references().await.unwrap().len(), 1);
    assert_eq!(store.list_file_references().await.unwrap().len(), 1);
    assert_eq!(store.inner().list_reads.load(Ordering::SeqCst), 1);

    seed_file(&store, "b.txt").await;
    assert!(cache.get(FILE_LIST_KEY).is_none());

    let listed = store.list_file_references().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "b.txt");
    assert_eq!(store.inner().list_reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_delete_invalidates_file_and_listing() {
    let cache = Arc::new(MemoryCache::new(100));
    let store = cached(Arc::clone(&cache));
    let file = seed_file(&store, "a.txt").await;

    store.get_file_reference(&file.id).await.unwrap();
    store.list_file_references().await.unwrap();

    assert!(store.delete_file_reference(&file.id).await.unwrap());
    assert!(cache.get(&file_key(&file.id)).is_none());
    assert!(cache.get(FILE_LIST_KEY).is_none());

    assert!(store.get_file_reference(&file.id).await.unwrap().is_none());
    assert!(store.list_file_references().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_undecodable_entry_falls_through() {
    let cache = Arc::new(MemoryCache::new(100));
    let store = cached(Arc::clone(&cache));
    let file = seed_file(&store, "a.txt").await;

    cache.set(
        &file_key(&file.id),
        json!({"unexpected": "shape"}),
        Duration::from_secs(60),
    );

    let fetched = store.get_file_reference(&file.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, file.id);
    assert_eq!(store.inner().file_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_slow_lookup_does_not_resurrect_deleted_file() {
    let cache = Arc::new(MemoryCache::new(100));
    let store = Arc::new(cached(Arc::clone(&cache)));
    let file = seed_file(&store, "a.txt").await;
    store.inner().read_delay_ms.store(200, Ordering::SeqCst);

    let reader = {
        let store = Arc::clone(&store);
        let id = file.id;
        tokio::spawn(async move { store.get_file_reference(&id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.delete_file_reference(&file.id).await.unwrap());

    // The in-flight read answered before the delete and may return it.
    reader.await.unwrap().unwrap();
    store.inner().read_delay_ms.store(0, Ordering::SeqCst);

    assert!(cache.get(&file_key(&file.id)).is_none());
    assert!(store.get_file_reference(&file.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_slow_listing_does_not_outlive_delete() {
    let cache = Arc::new(MemoryCache::new(100));
    let store = Arc::new(cached(Arc::clone(&cache)));
    let file = seed_file(&store, "a.txt").await;
    store.inner().read_delay_ms.store(200, Ordering::SeqCst);

    let reader = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.list_file_references().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.delete_file_reference(&file.id).await.unwrap());

    assert_eq!(reader.await.unwrap().unwrap().len(), 1);
    store.inner().read_delay_ms.store(0, Ordering::SeqCst);

    assert!(cache.get(FILE_LIST_KEY).is_none());
    assert!(store.list_file_references().await.unwrap().is_empty());
}
