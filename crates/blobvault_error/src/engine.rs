//! Deduplication engine error types.
//!
//! These are the only errors the request layer ever sees. Lower-level
//! [`StorageError`]s and [`MetadataError`]s are folded into this taxonomy by
//! the `From` conversions below.

use crate::{MetadataError, MetadataErrorKind, StorageError, StorageErrorKind};

/// Engine error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum EngineErrorKind {
    /// The referenced file reference or blob does not exist
    #[display("Not found: {}", _0)]
    NotFound(String),
    /// A backend location escapes its sandboxed root
    #[display("Invalid path: {}", _0)]
    InvalidPath(String),
    /// Declared size does not match the bytes actually received
    #[display("Content rejected: declared {} bytes, received {}", declared, observed)]
    ContentRejected {
        /// Size the caller announced
        declared: u64,
        /// Bytes observed on the stream or reported by the backend
        observed: u64,
    },
    /// Physical or metadata storage is unreachable or misbehaving
    #[display("Backend unavailable: {}", _0)]
    BackendUnavailable(String),
    /// A partial metadata write could not be rolled back
    #[display("Store corruption: {}", _0)]
    StoreCorruption(String),
}

impl EngineErrorKind {
    /// Client errors are caused by the request; everything else is on the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineErrorKind::NotFound(_)
                | EngineErrorKind::InvalidPath(_)
                | EngineErrorKind::ContentRejected { .. }
        )
    }
}

/// Engine error with source location tracking.
///
/// # Examples
///
/// ```
/// use blobvault_error::{EngineError, EngineErrorKind};
///
/// let err = EngineError::new(EngineErrorKind::BackendUnavailable(
///     "connect to 10.0.0.7:8888 refused".to_string(),
/// ));
/// assert!(!err.kind().is_client_error());
/// assert!(!err.public_message().contains("10.0.0.7"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Engine Error: {} at line {} in {}", kind, line, file)]
pub struct EngineError {
    /// The kind of error that occurred
    pub kind: EngineErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl EngineError {
    /// Create a new engine error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: EngineErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &EngineErrorKind {
        &self.kind
    }

    /// Message safe to hand to an untrusted client.
    ///
    /// Server-side failures collapse to a fixed string; internal paths, URLs
    /// and connection strings only ever appear in `Display` and the logs.
    pub fn public_message(&self) -> String {
        match &self.kind {
            EngineErrorKind::NotFound(_) => "file not found".to_string(),
            EngineErrorKind::InvalidPath(_) => "invalid file path".to_string(),
            EngineErrorKind::ContentRejected { declared, observed } => format!(
                "declared size {} does not match received size {}",
                declared, observed
            ),
            EngineErrorKind::BackendUnavailable(_) => "storage service unavailable".to_string(),
            EngineErrorKind::StoreCorruption(_) => "internal server error".to_string(),
        }
    }
}

impl From<StorageError> for EngineError {
    #[track_caller]
    fn from(err: StorageError) -> Self {
        let kind = match err.kind {
            StorageErrorKind::NotFound(path) => EngineErrorKind::NotFound(path),
            StorageErrorKind::InvalidPath(path) => EngineErrorKind::InvalidPath(path),
            other => EngineErrorKind::BackendUnavailable(other.to_string()),
        };
        EngineError::new(kind)
    }
}

impl From<MetadataError> for EngineError {
    #[track_caller]
    fn from(err: MetadataError) -> Self {
        let kind = match err.kind {
            MetadataErrorKind::NotFound => EngineErrorKind::NotFound("record".to_string()),
            other => EngineErrorKind::BackendUnavailable(other.to_string()),
        };
        EngineError::new(kind)
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
