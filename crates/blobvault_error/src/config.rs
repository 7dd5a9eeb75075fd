//! Configuration error types.

/// What went wrong while assembling a configuration.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ConfigErrorKind {
    /// A source could not be read or merged
    #[display("could not load {}", _0)]
    Load(String),
    /// The merged configuration does not deserialize
    #[display("invalid configuration: {}", _0)]
    Parse(String),
    /// The configuration asks for something this build does not include
    #[display("unsupported: {}", _0)]
    Unsupported(String),
}

/// Configuration error with source location.
///
/// # Examples
///
/// ```
/// use blobvault_error::{ConfigError, ConfigErrorKind};
///
/// let err = ConfigError::new(ConfigErrorKind::Parse("unknown storage type: tape".to_string()));
/// assert!(err.to_string().contains("tape"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", kind, line, file)]
pub struct ConfigError {
    /// The kind of error that occurred
    pub kind: ConfigErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError at the current location.
    #[track_caller]
    pub fn new(kind: ConfigErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ConfigErrorKind {
        &self.kind
    }
}
