//! Shared fixtures and failure-injecting doubles for engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use blobvault_core::{
    Blob, ContentHash, CreateBlobOutcome, FileId, FileReference, NewBlob, NewFileReference,
    UploadRequest,
};
use blobvault_engine::{DedupEngine, EngineConfig};
use blobvault_error::{
    MetadataError, MetadataErrorKind, MetadataResult, StorageError, StorageErrorKind,
    StorageResult,
};
use blobvault_metadata::{InMemoryMetadataStore, MetadataStore};
use blobvault_storage::{ByteStream, FileSystemBackend, StorageBackend, stream_from_bytes};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

pub const HELLO: &[u8] = b"Hello, World!";
pub const HELLO_HASH: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

pub fn upload(name: &str, data: &'static [u8]) -> (UploadRequest, ByteStream) {
    (
        UploadRequest::new(name, data.len() as u64, "text/plain"),
        stream_from_bytes(data),
    )
}

/// Metadata store whose operations can be told to fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: InMemoryMetadataStore,
    pub fail_create_blob: AtomicBool,
    pub fail_increment: AtomicBool,
    /// Answer this many increments with NotFound, as if the blob had just retired
    pub retire_on_increment: AtomicUsize,
    pub fail_decrement: AtomicBool,
    pub fail_create_file: AtomicBool,
    /// Never answer file reference creation
    pub stall_create_file: AtomicBool,
}

fn injected() -> MetadataError {
    MetadataError::new(MetadataErrorKind::Query("injected failure".to_string()))
}

/// Flip one of the injection switches.
pub fn set_flag(flag: &AtomicBool, value: bool) {
    flag.store(value, Ordering::SeqCst);
}

#[async_trait]
impl MetadataStore for FlakyStore {
    async fn get_blob(&self, hash: &ContentHash) -> MetadataResult<Option<Blob>> {
        self.inner.get_blob(hash).await
    }

    async fn create_blob(&self, blob: NewBlob) -> MetadataResult<CreateBlobOutcome> {
        if self.fail_create_blob.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.create_blob(blob).await
    }

    async fn increment_blob_ref(&self, hash: &ContentHash) -> MetadataResult<Blob> {
        if self.fail_increment.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let retire = self
            .retire_on_increment
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if retire.is_ok() {
            return Err(MetadataError::new(MetadataErrorKind::NotFound));
        }
        self.inner.increment_blob_ref(hash).await
    }

    async fn decrement_blob_ref(&self, hash: &ContentHash) -> MetadataResult<Blob> {
        if self.fail_decrement.load(Ordering::SeqCst) {
            return Err(injected());
        }
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
        if self.fail_create_file.load(Ordering::SeqCst) {
            return Err(injected());
        }
        if self.stall_create_file.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.create_file_reference(file).await
    }

    async fn get_file_reference(&self, id: &FileId) -> MetadataResult<Option<FileReference>> {
        self.inner.get_file_reference(id).await
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
        self.inner.list_file_references().await
    }
}

/// Local backend whose writes and deletes can be told to fail.
pub struct FlakyBackend {
    pub inner: FileSystemBackend,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
}

#[async_trait]
impl StorageBackend for FlakyBackend {
    async fn put(&self, location: &str, body: ByteStream, declared_size: u64) -> StorageResult<u64> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::new(StorageErrorKind::Unavailable(
                "filer at 10.0.0.7:8888 refused connection".to_string(),
            )));
        }
        self.inner.put(location, body, declared_size).await
    }

    async fn get(&self, location: &str) -> StorageResult<ByteStream> {
        self.inner.get(location).await
    }

    async fn delete(&self, location: &str) -> StorageResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::new(StorageErrorKind::Unavailable(
                "injected delete failure".to_string(),
            )));
        }
        self.inner.delete(location).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// An engine over a temp directory with both doubles in place.
pub struct Harness {
    pub dir: TempDir,
    pub backend: Arc<FlakyBackend>,
    pub store: Arc<FlakyStore>,
    pub engine: Arc<DedupEngine>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(EngineConfig::default()).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FlakyBackend {
            inner: FileSystemBackend::new(dir.path()).await.unwrap(),
            fail_put: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        });
        let store = Arc::new(FlakyStore::default());
        let engine = Arc::new(DedupEngine::new(backend.clone(), store.clone(), config));
        Self {
            dir,
            backend,
            store,
            engine,
        }
    }

    /// Objects currently stored under the default prefix.
    pub async fn objects(&self) -> Vec<String> {
        self.backend.inner.list("blobs").await.unwrap()
    }

    pub async fn blob(&self, hash: &str) -> Option<Blob> {
        self.store
            .inner
            .get_blob(&ContentHash::parse(hash).unwrap())
            .await
            .unwrap()
    }

    pub async fn store_hello(&self, name: &str) -> FileReference {
        let (request, body) = upload(name, HELLO);
        self.engine.store(request, body).await.unwrap()
    }
}

/// Poll until `check` holds, for background cleanup spawned by a dropped upload.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
