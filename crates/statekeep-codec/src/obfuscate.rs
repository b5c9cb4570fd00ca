//! Obfuscation stage.
//!
//! Not a security boundary: see the crate documentation.

use sha2::{Digest, Sha256};

use crate::error::{CodecError, CodecResult};

/// Reversible keyed byte transform applied after compression.
pub trait Obfuscator: Send + Sync {
    fn name(&self) -> &'static str;

    fn obfuscate(&self, data: &[u8], key_material: &str) -> CodecResult<Vec<u8>>;

    fn deobfuscate(&self, data: &[u8], key_material: &str) -> CodecResult<Vec<u8>>;
}

/// Derive a 32-byte key from arbitrary key material (the backup id).
pub fn derive_key(key_material: &str) -> CodecResult<[u8; 32]> {
    if key_material.is_empty() {
        return Err(CodecError::InvalidKey(
            "key material must not be empty".to_string(),
        ));
    }
    Ok(Sha256::digest(key_material.as_bytes()).into())
}

/// XOR with a repeating key derived from the key material.
#[derive(Debug, Clone, Copy, Default)]
pub struct XorObfuscator;

impl XorObfuscator {
    fn apply(data: &[u8], key_material: &str) -> CodecResult<Vec<u8>> {
        let key = derive_key(key_material)?;
        Ok(data
            .iter()
            .zip(key.iter().cycle())
            .map(|(byte, k)| byte ^ k)
            .collect())
    }
}

impl Obfuscator for XorObfuscator {
    fn name(&self) -> &'static str {
        "xor"
    }

    fn obfuscate(&self, data: &[u8], key_material: &str) -> CodecResult<Vec<u8>> {
        Self::apply(data, key_material)
    }

    fn deobfuscate(&self, data: &[u8], key_material: &str) -> CodecResult<Vec<u8>> {
        Self::apply(data, key_material)
    }
}
