//! Top-level error wrapper types.

use crate::{ConfigError, EngineError, JsonError, MetadataError, StorageError};

/// Every error a blobvault component can produce.
///
/// # Examples
///
/// ```
/// use blobvault_error::{ConfigError, ConfigErrorKind, VaultError};
///
/// let err: VaultError =
///     ConfigError::new(ConfigErrorKind::Load("~/.config/blobvault/blobvault.toml".to_string())).into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum VaultErrorKind {
    /// Storage backend error
    #[from(StorageError)]
    Storage(StorageError),
    /// Metadata store error
    #[from(MetadataError)]
    Metadata(MetadataError),
    /// Deduplication engine error
    #[from(EngineError)]
    Engine(EngineError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
}

/// Blobvault error with kind discrimination.
///
/// # Examples
///
/// ```
/// use blobvault_error::{ConfigError, ConfigErrorKind, VaultResult};
///
/// fn might_fail() -> VaultResult<()> {
///     Err(ConfigError::new(ConfigErrorKind::Parse("missing field `root`".to_string())))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Blobvault Error: {}", _0)]
pub struct VaultError(Box<VaultErrorKind>);

impl VaultError {
    /// Create a new error from a kind.
    pub fn new(kind: VaultErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &VaultErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to VaultErrorKind
impl<T> From<T> for VaultError
where
    T: Into<VaultErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for blobvault operations.
pub type VaultResult<T> = std::result::Result<T, VaultError>;
