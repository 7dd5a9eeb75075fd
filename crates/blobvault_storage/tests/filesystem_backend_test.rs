//! Tests for the filesystem backend.

use blobvault_storage::{
    ByteStream, FileSystemBackend, StorageBackend, StorageErrorKind, collect_stream,
    stream_from_bytes,
};
use bytes::Bytes;
use tempfile::TempDir;

async fn backend() -> (TempDir, FileSystemBackend) {
    let temp_dir = TempDir::new().unwrap();
    let backend = FileSystemBackend::new(temp_dir.path()).await.unwrap();
    (temp_dir, backend)
}

#[tokio::test]
async fn test_put_and_get() {
    let (_dir, backend) = backend().await;

    let written = backend
        .put("blobs/ab/cd/one", stream_from_bytes(b"Hello, World!".to_vec()), 13)
        .await
        .unwrap();
    assert_eq!(written, 13);

    let body = collect_stream(backend.get("blobs/ab/cd/one").await.unwrap())
        .await
        .unwrap();
    assert_eq!(body, b"Hello, World!");
}

#[tokio::test]
async fn test_put_reports_actual_bytes_not_declared() {
    let (_dir, backend) = backend().await;

    let written = backend
        .put("blobs/short", stream_from_bytes(b"abc".to_vec()), 4096)
        .await
        .unwrap();
    assert_eq!(written, 3);
}

#[tokio::test]
async fn test_multi_chunk_stream() {
    let (_dir, backend) = backend().await;

    let chunks: Vec<std::io::Result<Bytes>> = (0..4)
        .map(|i| Ok(Bytes::from(vec![i as u8; 100_000])))
        .collect();
    let body: ByteStream = Box::pin(futures::stream::iter(chunks));

    let written = backend.put("blobs/large", body, 400_000).await.unwrap();
    assert_eq!(written, 400_000);

    let body = collect_stream(backend.get("blobs/large").await.unwrap())
        .await
        .unwrap();
    assert_eq!(body.len(), 400_000);
    assert_eq!(body[399_999], 3);
}

#[tokio::test]
async fn test_failed_stream_leaves_nothing_behind() {
    let (dir, backend) = backend().await;

    let chunks: Vec<std::io::Result<Bytes>> = vec![
        Ok(Bytes::from_static(b"partial")),
        Err(std::io::Error::other("client went away")),
    ];
    let body: ByteStream = Box::pin(futures::stream::iter(chunks));

    let result = backend.put("blobs/broken", body, 100).await;
    assert!(result.is_err());
    assert!(!dir.path().join("blobs/broken").exists());
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let (_dir, backend) = backend().await;

    let err = match backend.get("blobs/nope").await {
        Ok(_) => panic!("expected not found"),
        Err(e) => e,
    };
    assert!(matches!(err.kind(), StorageErrorKind::NotFound(_)));
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (dir, backend) = backend().await;

    backend
        .put("blobs/gone", stream_from_bytes(b"x".to_vec()), 1)
        .await
        .unwrap();
    backend.delete("blobs/gone").await.unwrap();
    assert!(!dir.path().join("blobs/gone").exists());

    backend.delete("blobs/gone").await.unwrap();
}

#[tokio::test]
async fn test_list_recurses_and_sorts() {
    let (_dir, backend) = backend().await;

    for location in ["blobs/b/2", "blobs/a/1", "blobs/a/x/3", "other/4"] {
        backend
            .put(location, stream_from_bytes(b"data".to_vec()), 4)
            .await
            .unwrap();
    }

    let listed = backend.list("blobs").await.unwrap();
    assert_eq!(listed, vec!["blobs/a/1", "blobs/a/x/3", "blobs/b/2"]);

    let everything = backend.list("").await.unwrap();
    assert_eq!(everything.len(), 4);

    assert!(backend.list("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_traversal_rejected_before_io() {
    let (dir, backend) = backend().await;

    for location in ["../outside", "/etc/passwd", "blobs/../../outside", "etc/shadow"] {
        let err = backend
            .put(location, stream_from_bytes(b"evil".to_vec()), 4)
            .await
            .unwrap_err();
        assert!(err.is_invalid_path(), "{location} should be rejected");
    }

    assert!(!dir.path().parent().unwrap().join("outside").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_directory_cannot_redirect_writes() {
    let (dir, backend) = backend().await;
    let outside = TempDir::new().unwrap();

    std::os::unix::fs::symlink(outside.path(), dir.path().join("blobs")).unwrap();

    let err = backend
        .put("blobs/ab/escape", stream_from_bytes(b"evil".to_vec()), 4)
        .await
        .unwrap_err();
    assert!(err.is_invalid_path());
    assert!(!outside.path().join("ab/escape").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_file_cannot_be_read() {
    let (dir, backend) = backend().await;
    let outside = TempDir::new().unwrap();
    let secret = outside.path().join("secret");
    std::fs::write(&secret, b"secret").unwrap();

    std::fs::create_dir_all(dir.path().join("blobs")).unwrap();
    std::os::unix::fs::symlink(&secret, dir.path().join("blobs/link")).unwrap();

    let err = match backend.get("blobs/link").await {
        Ok(_) => panic!("symlink escape should be rejected"),
        Err(e) => e,
    };
    assert!(err.is_invalid_path());

    // Symlinks are not reported by listings either
    assert!(backend.list("blobs").await.unwrap().is_empty());
}
