//! JSON error types.

/// Failure to encode or decode a JSON document, such as CLI output.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("JSON Error: {}: {} at line {} in {}", context, message, line, file)]
pub struct JsonError {
    /// What was being encoded or decoded
    pub context: String,
    /// The underlying error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl JsonError {
    /// Wrap a serializer error, naming the document involved.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobvault_error::JsonError;
    ///
    /// let err = JsonError::new("sweep report", "key must be a string");
    /// assert!(err.to_string().contains("sweep report: key must be a string"));
    /// ```
    #[track_caller]
    pub fn new(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        let location = std::panic::Location::caller();
        Self {
            context: context.into(),
            message: err.to_string(),
            line: location.line(),
            file: location.file(),
        }
    }
}
