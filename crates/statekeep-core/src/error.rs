//! Error types for statekeep.

use thiserror::Error;

/// Result type alias using statekeep's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for statekeep operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Data does not conform to the schema for its version
    #[error("Validation error: {0}")]
    Validation(String),

    /// Checksum mismatch or otherwise corrupted payload
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Major-version or structural mismatch between versions or environments
    #[error("Compatibility error: {0}")]
    Compatibility(String),

    /// No registered migration route between two versions
    #[error("No migration path found from {from} to {to}")]
    PathNotFound { from: String, to: String },

    /// Underlying storage read/write failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// A migration step failed while transforming data
    #[error("Migration error: {0}")]
    Migration(String),

    /// Payload could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable snake_case tag for the error category.
    ///
    /// Copied into structured operation results so callers can branch on the
    /// failure class without parsing the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Integrity(_) => "integrity",
            Error::Compatibility(_) => "compatibility",
            Error::PathNotFound { .. } => "path_not_found",
            Error::Storage(_) | Error::Io(_) => "storage",
            Error::Migration(_) => "migration",
            Error::Codec(_) => "codec",
            Error::NotFound(_) => "not_found",
            Error::Serialization(_) => "serialization",
            Error::InvalidInput(_) => "invalid_input",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
