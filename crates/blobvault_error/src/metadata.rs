//! Metadata store error types.

/// Metadata store error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum MetadataErrorKind {
    /// Connection failed
    #[display("Database connection error: {}", _0)]
    Connection(String),
    /// Query execution failed
    #[display("Database query error: {}", _0)]
    Query(String),
    /// Serialization/deserialization error
    #[display("Serialization error: {}", _0)]
    Serialization(String),
    /// Migration error
    #[display("Migration error: {}", _0)]
    Migration(String),
    /// Record not found (or not in a state the operation may touch)
    #[display("Record not found")]
    NotFound,
    /// A record with the same key already exists
    #[display("Conflicting record: {}", _0)]
    Conflict(String),
    /// A foreign key or check constraint was violated
    #[display("Integrity violation: {}", _0)]
    Integrity(String),
}

/// Metadata store error with source location tracking.
///
/// # Examples
///
/// ```
/// use blobvault_error::{MetadataError, MetadataErrorKind};
///
/// let err = MetadataError::new(MetadataErrorKind::NotFound);
/// assert!(format!("{}", err).contains("not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Metadata Error: {} at line {} in {}", kind, line, file)]
pub struct MetadataError {
    /// The kind of error that occurred
    pub kind: MetadataErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl MetadataError {
    /// Create a new MetadataError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: MetadataErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &MetadataErrorKind {
        &self.kind
    }

    /// Whether the targeted record does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind == MetadataErrorKind::NotFound
    }
}

/// Result type for metadata store operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

// Diesel error conversions (only available with postgres feature)
#[cfg(feature = "postgres")]
impl From<diesel::result::Error> for MetadataError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind as Pg, Error};

        match err {
            Error::NotFound => MetadataError::new(MetadataErrorKind::NotFound),
            Error::DatabaseError(Pg::UniqueViolation, info) => {
                MetadataError::new(MetadataErrorKind::Conflict(info.message().to_string()))
            }
            Error::DatabaseError(Pg::ForeignKeyViolation | Pg::CheckViolation, info) => {
                MetadataError::new(MetadataErrorKind::Integrity(info.message().to_string()))
            }
            Error::DeserializationError(e) | Error::SerializationError(e) => {
                MetadataError::new(MetadataErrorKind::Serialization(e.to_string()))
            }
            _ => MetadataError::new(MetadataErrorKind::Query(err.to_string())),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<diesel::ConnectionError> for MetadataError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        MetadataError::new(MetadataErrorKind::Connection(err.to_string()))
    }
}

#[cfg(feature = "postgres")]
impl From<diesel::r2d2::PoolError> for MetadataError {
    #[track_caller]
    fn from(err: diesel::r2d2::PoolError) -> Self {
        MetadataError::new(MetadataErrorKind::Connection(err.to_string()))
    }
}
