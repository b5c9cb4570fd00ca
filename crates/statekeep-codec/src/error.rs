//! Error types for codec operations.

use thiserror::Error;

/// Codec operation errors.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Magic bytes missing after de-obfuscation - wrong key or corrupted data.
    #[error("Invalid magic bytes - wrong key or corrupted payload")]
    InvalidMagic,

    /// Compression failed.
    #[error("Compression failed: {0}")]
    Compression(String),

    /// Decompression failed.
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// Key material unusable for obfuscation.
    #[error("Invalid key material: {0}")]
    InvalidKey(String),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodecError::InvalidMagic;
        assert!(err.to_string().contains("magic bytes"));
    }

    #[test]
    fn test_invalid_key_display() {
        let err = CodecError::InvalidKey("empty".into());
        assert_eq!(err.to_string(), "Invalid key material: empty");
    }
}
