//! Wiring a configured deployment together.

use crate::{MetadataConfig, VaultConfig};
use blobvault_cache::{Cache, build_cache};
use blobvault_engine::DedupEngine;
use blobvault_error::VaultResult;
#[cfg(not(feature = "postgres"))]
use blobvault_error::{ConfigError, ConfigErrorKind};
use blobvault_metadata::{CachedMetadataStore, InMemoryMetadataStore, MetadataStore};
use blobvault_storage::connect_backend;
use std::sync::Arc;

/// A ready-to-use store: backend, metadata, cache and engine built from one
/// [`VaultConfig`].
///
/// # Example
///
/// ```
/// use blobvault::{Vault, VaultConfig};
/// use blobvault_storage::BackendConfig;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let dir = tempfile::tempdir().unwrap();
/// let config = VaultConfig::default().with_storage(BackendConfig::Local {
///     root: dir.path().to_path_buf(),
/// });
///
/// let vault = Vault::from_config(config).await.unwrap();
/// assert!(vault.engine().enumerate().await.unwrap().is_empty());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Vault {
    config: VaultConfig,
    engine: Arc<DedupEngine>,
}

impl Vault {
    /// Connect the backend, open the metadata store behind its cache and
    /// start the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable, the database cannot be
    /// opened, or PostgreSQL is configured without the `postgres` feature.
    #[tracing::instrument(skip(config), fields(
        storage = config.storage().kind(),
        metadata = config.metadata().kind()
    ))]
    pub async fn from_config(config: VaultConfig) -> VaultResult<Self> {
        let backend = connect_backend(config.storage()).await?;
        let cache = build_cache(config.cache());
        let metadata = open_metadata(&config, cache).await?;

        let engine = DedupEngine::new(backend, metadata, config.engine().clone());
        tracing::info!("Vault ready");
        Ok(Self {
            config,
            engine: Arc::new(engine),
        })
    }

    /// Load configuration from every source and build the vault.
    ///
    /// # Errors
    ///
    /// See [`VaultConfig::load`] and [`Vault::from_config`].
    pub async fn open(explicit: Option<&std::path::Path>) -> VaultResult<Self> {
        Self::from_config(VaultConfig::load(explicit)?).await
    }

    /// The configuration this vault was built from.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// The deduplication engine, shareable across tasks.
    pub fn engine(&self) -> &Arc<DedupEngine> {
        &self.engine
    }
}

async fn open_metadata(
    config: &VaultConfig,
    cache: Arc<dyn Cache>,
) -> VaultResult<Arc<dyn MetadataStore>> {
    match config.metadata() {
        MetadataConfig::Memory => Ok(Arc::new(CachedMetadataStore::from_config(
            InMemoryMetadataStore::new(),
            cache,
            config.cache(),
        ))),
        MetadataConfig::Postgres {
            database_url,
            max_connections,
        } => open_postgres(database_url, *max_connections, cache, config).await,
    }
}

#[cfg(feature = "postgres")]
async fn open_postgres(
    database_url: &str,
    max_connections: u32,
    cache: Arc<dyn Cache>,
    config: &VaultConfig,
) -> VaultResult<Arc<dyn MetadataStore>> {
    use blobvault_metadata::PostgresMetadataStore;

    let store = PostgresMetadataStore::connect(database_url, max_connections).await?;
    Ok(Arc::new(CachedMetadataStore::from_config(
        store,
        cache,
        config.cache(),
    )))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(
    _database_url: &str,
    _max_connections: u32,
    _cache: Arc<dyn Cache>,
    _config: &VaultConfig,
) -> VaultResult<Arc<dyn MetadataStore>> {
    Err(ConfigError::new(ConfigErrorKind::Unsupported(
        "metadata type \"postgres\" requires building with --features postgres".to_string(),
    ))
    .into())
}
