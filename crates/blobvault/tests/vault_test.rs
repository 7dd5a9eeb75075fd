//! End-to-end wiring through `Vault::from_config`.

use blobvault::{RemoveOutcome, UploadRequest, Vault, VaultConfig};
use blobvault_cache::CacheConfig;
use blobvault_storage::{BackendConfig, collect_stream, stream_from_bytes};

fn local_config(root: &std::path::Path) -> VaultConfig {
    VaultConfig::default().with_storage(BackendConfig::Local {
        root: root.to_path_buf(),
    })
}

#[tokio::test]
async fn test_local_memory_vault_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let vault = Vault::from_config(local_config(dir.path())).await.unwrap();
    let engine = vault.engine();

    let a = engine
        .store(
            UploadRequest::new("a.txt", 13, "text/plain"),
            stream_from_bytes(&b"Hello, World!"[..]),
        )
        .await
        .unwrap();
    let b = engine
        .store(
            UploadRequest::new("b.txt", 13, "text/plain"),
            stream_from_bytes(&b"Hello, World!"[..]),
        )
        .await
        .unwrap();
    assert_eq!(a.hash, b.hash);

    let listed = engine.enumerate().await.unwrap();
    assert_eq!(listed.len(), 2);

    assert_eq!(
        engine.remove(&a.id).await.unwrap(),
        RemoveOutcome::Released { remaining: 1 }
    );
    let (body, _) = engine.fetch(&b.id).await.unwrap();
    assert_eq!(collect_stream(body).await.unwrap(), b"Hello, World!");
    assert_eq!(engine.remove(&b.id).await.unwrap(), RemoveOutcome::Reclaimed);
    assert!(engine.enumerate().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_vault_with_cache_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let config =
        local_config(dir.path()).with_cache(CacheConfig::default().with_enabled(false));
    let vault = Vault::from_config(config).await.unwrap();

    let file = vault
        .engine()
        .store(
            UploadRequest::new("a.txt", 3, "text/plain"),
            stream_from_bytes(&b"abc"[..]),
        )
        .await
        .unwrap();
    assert_eq!(vault.engine().enumerate().await.unwrap()[0].id, file.id);
    assert!(!*vault.config().cache().enabled());
}

#[tokio::test]
async fn test_location_prefix_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path())
        .with_engine(blobvault::EngineConfig::default().with_location_prefix("objects".to_string()));
    let vault = Vault::from_config(config).await.unwrap();

    vault
        .engine()
        .store(
            UploadRequest::new("a.txt", 3, "text/plain"),
            stream_from_bytes(&b"abc"[..]),
        )
        .await
        .unwrap();
    assert!(dir.path().join("objects").is_dir());
    assert!(!dir.path().join("blobs").exists());
}

#[cfg(not(feature = "postgres"))]
#[tokio::test]
async fn test_postgres_requires_feature() {
    use blobvault::MetadataConfig;

    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path()).with_metadata(MetadataConfig::Postgres {
        database_url: "postgres://localhost/blobvault".to_string(),
        max_connections: 1,
    });

    let err = Vault::from_config(config).await.unwrap_err();
    match err.kind() {
        blobvault::VaultErrorKind::Config(config) => assert!(matches!(
            config.kind(),
            blobvault::ConfigErrorKind::Unsupported(_)
        )),
        other => panic!("expected config error, got {}", other),
    }
}
