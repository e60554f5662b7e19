//! Error types for architecture loading and validation.

/// Errors that can occur when loading or validating an architecture description.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the architecture file.
    #[error("failed to read architecture: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse architecture: {0}")]
    ParseError(String),

    /// A section refers to a segment, global, block, tile or port that is not declared.
    #[error("unknown {kind} '{name}'")]
    UnknownReference {
        /// What kind of item was referenced.
        kind: &'static str,
        /// The referenced name.
        name: String,
    },

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}
