//! Common result and error types for the fabric compiler.

/// The standard result type for operations that can only fail on an engine defect.
///
/// Construction and topology errors have their own typed enums in the crates
/// that detect them; `InternalError` is reserved for broken invariants of the
/// in-memory module graph itself.
pub type FabricResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in the engine, not a malformed architecture.
#[derive(Debug, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
