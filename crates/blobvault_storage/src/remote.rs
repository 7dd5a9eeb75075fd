//! Remote object backend speaking the filer HTTP protocol.
//!
//! The cluster has a master (health endpoint `/cluster/status`) and a filer
//! that maps paths to objects:
//!
//! - `POST {filer}/{location}` with a multipart `file` field stores an object
//! - `GET {filer}/{location}` streams it back
//! - `DELETE {filer}/{location}` removes it
//! - `GET {filer}/{dir}/` with `Accept: application/json` lists a directory,
//!   paginated through `limit` and `lastFileName`

use crate::{ByteStream, StorageBackend};
use async_trait::async_trait;
use blobvault_error::{StorageError, StorageErrorKind, StorageResult};
use futures::TryStreamExt;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

/// `S_IFDIR` bit in a filer entry's mode.
const MODE_DIRECTORY: u32 = 0o040000;
/// Go's `os.ModeDir`, which some filer versions report instead.
const MODE_DIR_FLAG: u32 = 1 << 31;

/// Connection settings for [`RemoteBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct RemoteBackendConfig {
    /// Master URL, scheme optional (e.g. `seaweedfs-master:9333`)
    pub master_url: String,
    /// Filer URL; derived from the master URL when absent
    #[serde(default)]
    pub filer_url: Option<String>,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Entries requested per listing page
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_list_page_size() -> usize {
    1000
}

impl RemoteBackendConfig {
    /// Settings for a master URL with defaults for everything else.
    pub fn new(master_url: impl Into<String>) -> Self {
        Self {
            master_url: master_url.into(),
            filer_url: None,
            timeout_secs: default_timeout_secs(),
            list_page_size: default_list_page_size(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DirectoryListing {
    #[serde(default)]
    entries: Option<Vec<DirectoryEntry>>,
    #[serde(default)]
    last_file_name: String,
    #[serde(default)]
    should_display_load_more: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DirectoryEntry {
    full_path: String,
    #[serde(default)]
    mode: u32,
}

impl DirectoryEntry {
    fn is_directory(&self) -> bool {
        self.mode & MODE_DIRECTORY == MODE_DIRECTORY || self.mode & MODE_DIR_FLAG != 0
    }
}

/// Add `http://` when no scheme is given and drop trailing slashes.
fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

/// The conventional filer address next to a master: port 9333 becomes 8888
/// and a `seaweedfs-master` host becomes `seaweedfs-filer`.
///
/// # Examples
///
/// ```
/// use blobvault_storage::derive_filer_url;
///
/// assert_eq!(
///     derive_filer_url("seaweedfs-master:9333"),
///     "http://seaweedfs-filer:8888"
/// );
/// ```
pub fn derive_filer_url(master_url: &str) -> String {
    normalize_url(master_url)
        .replacen(":9333", ":8888", 1)
        .replacen("seaweedfs-master", "seaweedfs-filer", 1)
}

fn unavailable(message: impl Into<String>) -> StorageError {
    StorageError::new(StorageErrorKind::Unavailable(message.into()))
}

/// Object backend on a remote filer cluster.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    master_url: String,
    filer_url: Url,
    client: reqwest::Client,
    list_page_size: usize,
}

impl RemoteBackend {
    /// Build a client and verify the master answers its health check.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for unusable URLs, `Unavailable` if the master cannot
    /// be reached or reports an unhealthy status.
    #[tracing::instrument(skip(config), fields(master = %config.master_url))]
    pub async fn connect(config: &RemoteBackendConfig) -> StorageResult<Self> {
        let master_url = normalize_url(&config.master_url);
        let filer_raw = config
            .filer_url
            .as_deref()
            .map(normalize_url)
            .unwrap_or_else(|| derive_filer_url(&config.master_url));

        let filer_url = Url::parse(&filer_raw).map_err(|e| {
            StorageError::new(StorageErrorKind::InvalidConfig(format!(
                "filer url {}: {}",
                filer_raw, e
            )))
        })?;
        if filer_url.cannot_be_a_base() {
            return Err(StorageError::new(StorageErrorKind::InvalidConfig(format!(
                "filer url {} cannot carry a path",
                filer_raw
            ))));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                StorageError::new(StorageErrorKind::InvalidConfig(format!(
                    "http client: {}",
                    e
                )))
            })?;

        let backend = Self {
            master_url,
            filer_url,
            client,
            list_page_size: config.list_page_size.max(1),
        };
        backend.health_check().await?;

        tracing::info!(filer = %backend.filer_url, "Connected remote backend");
        Ok(backend)
    }

    /// Filer URL for a location, percent-encoding each segment.
    fn object_url(&self, location: &str, directory: bool) -> StorageResult<Url> {
        if (location.is_empty() && !directory)
            || location.contains("..")
            || location.starts_with('/')
        {
            return Err(StorageError::new(StorageErrorKind::InvalidPath(format!(
                "{:?}",
                location
            ))));
        }

        let mut url = self.filer_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| unavailable("filer url cannot carry a path"))?;
            segments.pop_if_empty();
            segments.extend(location.split('/').filter(|s| !s.is_empty()));
            if directory {
                segments.push("");
            }
        }
        Ok(url)
    }

    /// Fetch one listing page of `dir`; `None` when the directory is absent.
    async fn list_page(
        &self,
        dir: &str,
        last_file_name: Option<&str>,
    ) -> StorageResult<Option<DirectoryListing>> {
        let mut url = self.object_url(dir, true)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.list_page_size.to_string());
            if let Some(last) = last_file_name {
                query.append_pair("lastFileName", last);
            }
        }

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| unavailable(format!("list {}: {}", dir, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<DirectoryListing>()
                .await
                .map(Some)
                .map_err(|e| unavailable(format!("malformed listing for {}: {}", dir, e))),
            status => Err(unavailable(format!("list {} returned status {}", dir, status))),
        }
    }
}

#[async_trait]
impl StorageBackend for RemoteBackend {
    /// Uploads are buffered before sending so the filer receives a complete
    /// multipart body and the written count is exact.
    #[tracing::instrument(skip(self, body), fields(backend = "remote"))]
    async fn put(
        &self,
        location: &str,
        body: ByteStream,
        declared_size: u64,
    ) -> StorageResult<u64> {
        let url = self.object_url(location, false)?;

        let capacity = usize::try_from(declared_size).unwrap_or(0).min(64 * 1024 * 1024);
        let buffer = body
            .try_fold(Vec::with_capacity(capacity), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
            .map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!("upload stream: {}", e)))
            })?;
        let written = buffer.len() as u64;

        let file_name = location.rsplit('/').next().unwrap_or(location).to_string();
        let part = reqwest::multipart::Part::bytes(buffer).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| unavailable(format!("upload {}: {}", location, e)))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let detail = response.text().await.unwrap_or_default();
            return Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "upload {} returned status {}: {}",
                location, status, detail
            ))));
        }

        tracing::debug!(written, "Stored object");
        Ok(written)
    }

    #[tracing::instrument(skip(self), fields(backend = "remote"))]
    async fn get(&self, location: &str) -> StorageResult<ByteStream> {
        let url = self.object_url(location, false)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| unavailable(format!("get {}: {}", location, e)))?;

        match response.status() {
            StatusCode::OK => {
                let stream = response.bytes_stream().map_err(std::io::Error::other);
                Ok(Box::pin(stream))
            }
            StatusCode::NOT_FOUND => Err(StorageError::new(StorageErrorKind::NotFound(
                location.to_string(),
            ))),
            status => Err(unavailable(format!("get {} returned status {}", location, status))),
        }
    }

    #[tracing::instrument(skip(self), fields(backend = "remote"))]
    async fn delete(&self, location: &str) -> StorageResult<()> {
        let url = self.object_url(location, false)?;

        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| unavailable(format!("delete {}: {}", location, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                tracing::debug!("Object already absent");
                Ok(())
            }
            StatusCode::OK | StatusCode::ACCEPTED | StatusCode::NO_CONTENT => Ok(()),
            status => Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "delete {} returned status {}",
                location, status
            )))),
        }
    }

    /// Walks subdirectories depth-first and follows pagination on each.
    #[tracing::instrument(skip(self), fields(backend = "remote"))]
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut pending = vec![prefix.trim_matches('/').to_string()];
        let mut locations = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut cursor: Option<String> = None;
            loop {
                let Some(page) = self.list_page(&dir, cursor.as_deref()).await? else {
                    break;
                };

                for entry in page.entries.unwrap_or_default() {
                    let path = entry.full_path.trim_start_matches('/').to_string();
                    if entry.is_directory() {
                        pending.push(path);
                    } else {
                        locations.push(path);
                    }
                }

                if page.should_display_load_more && !page.last_file_name.is_empty() {
                    cursor = Some(page.last_file_name);
                } else {
                    break;
                }
            }
        }

        locations.sort();
        tracing::debug!(count = locations.len(), "Listed objects");
        Ok(locations)
    }

    fn backend_name(&self) -> &'static str {
        "remote"
    }

    /// Ask the master for cluster status.
    async fn health_check(&self) -> StorageResult<()> {
        let url = format!("{}/cluster/status", self.master_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(format!("master unreachable: {}", e)))?;

        if response.status() != StatusCode::OK {
            return Err(unavailable(format!(
                "master returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
