//! Backend selection.

use crate::{FileSystemBackend, RemoteBackend, RemoteBackendConfig, StorageBackend};
use blobvault_error::StorageResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Which object backend to use, as read from the `[storage]` table.
///
/// # Examples
///
/// ```
/// use blobvault_storage::BackendConfig;
///
/// let config: BackendConfig = serde_json::from_str(
///     r#"{ "type": "local", "root": "/var/lib/blobvault" }"#,
/// ).unwrap();
/// assert_eq!(config.kind(), "local");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Objects under a local directory
    Local {
        /// Storage root
        root: PathBuf,
    },
    /// Objects on a remote filer cluster
    Remote(RemoteBackendConfig),
}

impl BackendConfig {
    /// `"local"` or `"remote"`.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Local { .. } => "local",
            BackendConfig::Remote(_) => "remote",
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local {
            root: PathBuf::from("./data"),
        }
    }
}

/// Build the configured backend. Remote backends are health-checked first.
#[tracing::instrument(skip(config), fields(kind = config.kind()))]
pub async fn connect_backend(config: &BackendConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config {
        BackendConfig::Local { root } => Arc::new(FileSystemBackend::new(root).await?),
        BackendConfig::Remote(remote) => Arc::new(RemoteBackend::connect(remote).await?),
    };
    Ok(backend)
}
