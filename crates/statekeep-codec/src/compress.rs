//! Compression stage.

use crate::error::CodecResult;

/// A reversible byte transform applied before obfuscation.
pub trait Compressor: Send + Sync {
    /// Short name recorded in backup metadata.
    fn name(&self) -> &'static str;

    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> CodecResult<Vec<u8>>;
}

/// Pass-through placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCompressor;

impl Compressor for IdentityCompressor {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(data.to_vec())
    }
}
