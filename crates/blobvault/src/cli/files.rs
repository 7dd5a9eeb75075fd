//! File command handlers.

use super::commands::OutputFormat;
use blobvault::{
    FileId, JsonError, RemoveOutcome, StorageError, StorageErrorKind, UploadRequest, Vault,
    VaultResult,
};
use blobvault_storage::ByteStream;
use bytes::Bytes;
use futures::StreamExt;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const CHUNK_SIZE: usize = 64 * 1024;

fn read_error(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", path.display(), e)))
}

fn write_error(target: &str, e: std::io::Error) -> StorageError {
    StorageError::new(StorageErrorKind::FileWrite(format!("{}: {}", target, e)))
}

/// Stream a local file into the vault.
pub async fn put_file(
    vault: &Vault,
    path: &Path,
    name: Option<String>,
    content_type: String,
) -> VaultResult<()> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| read_error(path, e))?;
    let size = file
        .metadata()
        .await
        .map_err(|e| read_error(path, e))?
        .len();

    let name = name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    });

    let body: ByteStream = Box::pin(futures::stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), file)))
    }));

    let stored = vault
        .engine()
        .store(UploadRequest::new(name, size, content_type), body)
        .await?;

    println!("{}", stored.id);
    tracing::info!(hash = %stored.hash, size = stored.size, "Uploaded {}", path.display());
    Ok(())
}

/// Stream a file out of the vault to `output` or stdout.
pub async fn get_file(vault: &Vault, id: &FileId, output: Option<&Path>) -> VaultResult<()> {
    let (mut body, file) = vault.engine().fetch(id).await?;

    let (mut sink, target): (Box<dyn tokio::io::AsyncWrite + Unpin + Send>, String) = match output
    {
        Some(path) => (
            Box::new(
                tokio::fs::File::create(path)
                    .await
                    .map_err(|e| write_error(&path.display().to_string(), e))?,
            ),
            path.display().to_string(),
        ),
        None => (Box::new(tokio::io::stdout()), "stdout".to_string()),
    };

    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| read_error(Path::new(&file.name), e))?;
        sink.write_all(&chunk)
            .await
            .map_err(|e| write_error(&target, e))?;
        written += chunk.len() as u64;
    }
    sink.flush().await.map_err(|e| write_error(&target, e))?;

    tracing::debug!(written, name = %file.name, "Downloaded file");
    Ok(())
}

/// Remove a file reference and report what happened to its blob.
pub async fn remove_file(vault: &Vault, id: &FileId) -> VaultResult<()> {
    match vault.engine().remove(id).await? {
        RemoveOutcome::Released { remaining } => {
            println!("removed {} ({} references remain)", id, remaining)
        }
        RemoveOutcome::Reclaimed => println!("removed {} (content reclaimed)", id),
        RemoveOutcome::ReclaimPending { hash, reason } => {
            println!("removed {} (reclaim of {} pending: {})", id, hash, reason)
        }
    }
    Ok(())
}

/// Print every file reference.
pub async fn list_files(vault: &Vault, format: OutputFormat) -> VaultResult<()> {
    let files = vault.engine().enumerate().await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&files)
                .map_err(|e| JsonError::new("file listing", e))?;
            println!("{}", json);
        }
        OutputFormat::Human => {
            println!(
                "{:<36}  {:>12}  {:<24}  {:<20}  NAME",
                "ID", "SIZE", "CONTENT TYPE", "CREATED"
            );
            println!("{:-<110}", "");
            for file in &files {
                println!(
                    "{:<36}  {:>12}  {:<24}  {:<20}  {}",
                    file.id,
                    file.size,
                    file.content_type,
                    file.created_at.format("%Y-%m-%d %H:%M:%S"),
                    file.name
                );
            }
            println!("Total: {} files", files.len());
        }
    }

    Ok(())
}
