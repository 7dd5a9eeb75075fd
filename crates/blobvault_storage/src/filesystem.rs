//! Filesystem object backend.
//!
//! Objects live under a single root directory at their relative location,
//! e.g. `{root}/blobs/ab/cd/<uuid>`. Every location is resolved against the
//! canonical root and rejected if it would land outside of it, either
//! lexically or through a symlink.

use crate::{ByteStream, StorageBackend};
use async_trait::async_trait;
use blobvault_error::{StorageError, StorageErrorKind, StorageResult};
use bytes::Bytes;
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Chunk size for streamed reads.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// First path segments that are never valid object locations.
const RESERVED_PREFIXES: &[&str] = &["etc", "var", "usr", "home", "root", "sys", "proc"];

/// Filesystem storage backend.
///
/// # Example Structure
///
/// ```text
/// /var/lib/blobvault/
/// └── blobs/
///     ├── 3f/
///     │   └── 2a/
///     │       └── 3f2a9c1e-...  (object bytes)
///     └── 91/
///         └── 0b/
///             └── 910b44d7-...
/// ```
#[derive(Debug, Clone)]
pub struct FileSystemBackend {
    root: PathBuf,
    root_canonical: PathBuf,
}

impl FileSystemBackend {
    /// Create a backend rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or resolved.
    #[tracing::instrument(skip(root), fields(root = %root.as_ref().display()))]
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();

        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                root.display(),
                e
            )))
        })?;

        let root_canonical = tokio::fs::canonicalize(&root).await.map_err(|e| {
            StorageError::new(StorageErrorKind::InvalidConfig(format!(
                "cannot resolve storage root {}: {}",
                root.display(),
                e
            )))
        })?;

        tracing::info!(path = %root_canonical.display(), "Created filesystem backend");
        Ok(Self {
            root,
            root_canonical,
        })
    }

    /// The directory this backend writes under, as configured.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lexical validation of a relative location. Performs no I/O.
    fn validate_location(location: &str) -> StorageResult<PathBuf> {
        let invalid = |reason: &str| {
            StorageError::new(StorageErrorKind::InvalidPath(format!(
                "{}: {:?}",
                reason, location
            )))
        };

        if location.is_empty() {
            return Err(invalid("empty location"));
        }
        if location.contains("..") {
            return Err(invalid("parent traversal"));
        }
        if location.starts_with('/') || location.starts_with('\\') || location.contains('\0') {
            return Err(invalid("absolute or malformed location"));
        }

        let relative = PathBuf::from(location);
        if relative.is_absolute() {
            return Err(invalid("absolute location"));
        }

        let mut components = relative.components().peekable();
        if let Some(Component::Normal(first)) = components.peek()
            && RESERVED_PREFIXES
                .iter()
                .any(|reserved| first.eq_ignore_ascii_case(reserved))
        {
            return Err(invalid("reserved prefix"));
        }
        if !components.all(|c| matches!(c, Component::Normal(_))) {
            return Err(invalid("non-normal path component"));
        }

        Ok(relative)
    }

    /// Resolve a location to an absolute path, refusing symlink escapes.
    ///
    /// Existing paths are canonicalized directly. For paths that do not exist
    /// yet, the nearest existing ancestor must resolve inside the root, so a
    /// symlinked directory cannot redirect a write.
    fn resolve_sync(root: &Path, root_canonical: &Path, relative: &Path) -> StorageResult<PathBuf> {
        let path = root.join(relative);
        let escape = |what: &Path| {
            StorageError::new(StorageErrorKind::InvalidPath(format!(
                "{} resolves outside the storage root",
                what.display()
            )))
        };

        match std::fs::symlink_metadata(&path) {
            Ok(_) => {
                let canonical = path.canonicalize().map_err(|_| escape(relative))?;
                if !canonical.starts_with(root_canonical) || canonical == root_canonical {
                    return Err(escape(relative));
                }
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                ))));
            }
        }

        for ancestor in path.ancestors().skip(1) {
            match std::fs::symlink_metadata(ancestor) {
                Ok(_) => {
                    let canonical = ancestor.canonicalize().map_err(|_| escape(relative))?;
                    if !canonical.starts_with(root_canonical) {
                        return Err(escape(relative));
                    }
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(_) => return Err(escape(relative)),
            }
        }

        Err(escape(relative))
    }

    async fn resolve(&self, location: &str) -> StorageResult<PathBuf> {
        let relative = Self::validate_location(location)?;
        let root = self.root.clone();
        let root_canonical = self.root_canonical.clone();

        tokio::task::spawn_blocking(move || Self::resolve_sync(&root, &root_canonical, &relative))
            .await
            .map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "path resolution task failed: {}",
                    e
                )))
            })?
    }

    /// Write the stream to `path`, returning bytes written.
    async fn write_stream(path: &Path, mut body: ByteStream) -> StorageResult<u64> {
        let write_err = |e: std::io::Error| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                path.display(),
                e
            )))
        };

        let mut file = tokio::fs::File::create(path).await.map_err(write_err)?;
        let mut written = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!("upload stream: {}", e)))
            })?;
            file.write_all(&chunk).await.map_err(write_err)?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        Ok(written)
    }

    /// Recursive walk collecting regular files as `/`-separated relative paths.
    ///
    /// Symlinks are skipped. Unreadable directories are skipped rather than
    /// failing the whole listing.
    fn walk_sync(root: &Path, dir: &Path, out: &mut Vec<String>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                return;
            }
        };

        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            if file_type.is_dir() {
                Self::walk_sync(root, &path, out);
            } else if file_type.is_file()
                && let Ok(relative) = path.strip_prefix(root)
            {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(key);
            }
        }
    }
}

#[async_trait]
impl StorageBackend for FileSystemBackend {
    #[tracing::instrument(skip(self, body), fields(backend = "filesystem"))]
    async fn put(
        &self,
        location: &str,
        body: ByteStream,
        declared_size: u64,
    ) -> StorageResult<u64> {
        let path = self.resolve(location).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        match Self::write_stream(&path, body).await {
            Ok(written) => {
                tracing::debug!(written, declared_size, "Stored object");
                Ok(written)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&path).await
                    && cleanup.kind() != std::io::ErrorKind::NotFound
                {
                    tracing::warn!(
                        path = %path.display(),
                        error = %cleanup,
                        "Failed to remove partial object"
                    );
                }
                Err(e)
            }
        }
    }

    #[tracing::instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, location: &str) -> StorageResult<ByteStream> {
        let path = self.resolve(location).await?;

        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(location.to_string()))
            } else {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        })?;

        let stream = futures::stream::try_unfold(file, |mut file| async move {
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                return Ok(None);
            }
            buf.truncate(n);
            Ok(Some((Bytes::from(buf), file)))
        });

        Ok(Box::pin(stream))
    }

    #[tracing::instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, location: &str) -> StorageResult<()> {
        let path = self.resolve(location).await?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Object already absent");
                Ok(())
            }
            Err(e) => Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "delete {}: {}",
                path.display(),
                e
            )))),
        }
    }

    #[tracing::instrument(skip(self), fields(backend = "filesystem"))]
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let prefix = prefix.trim_end_matches('/');
        let start = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.resolve(prefix).await?
        };
        let root = self.root.clone();

        let mut locations = tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            match std::fs::symlink_metadata(&start) {
                Ok(meta) if meta.is_dir() => Self::walk_sync(&root, &start, &mut out),
                Ok(meta) if meta.is_file() => {
                    if let Ok(relative) = start.strip_prefix(&root) {
                        out.push(relative.to_string_lossy().replace('\\', "/"));
                    }
                }
                _ => {}
            }
            out
        })
        .await
        .map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!("listing task failed: {}", e)))
        })?;

        locations.sort();
        tracing::debug!(count = locations.len(), "Listed objects");
        Ok(locations)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let meta = tokio::fs::metadata(&self.root).await.map_err(|e| {
            StorageError::new(StorageErrorKind::Unavailable(format!(
                "{}: {}",
                self.root.display(),
                e
            )))
        })?;
        if !meta.is_dir() {
            return Err(StorageError::new(StorageErrorKind::Unavailable(format!(
                "{} is not a directory",
                self.root.display()
            ))));
        }
        Ok(())
    }
}
