//! # statekeep-codec
//!
//! Payload seams for statekeep backups.
//!
//! A backup payload passes through two swappable stages before it is
//! checksummed and persisted:
//!
//! - **Compression** ([`Compressor`]): the shipped [`IdentityCompressor`] is a
//!   pass-through placeholder so a real compressor can be substituted without
//!   touching the backup format.
//! - **Obfuscation** ([`Obfuscator`]): the shipped [`XorObfuscator`] XORs the
//!   payload with a key derived from the backup id.
//!
//! **Obfuscation is not encryption.** Anyone holding a backup can recover its
//! contents; the stage only keeps payloads from being casually readable.
//! Confidentiality requires replacing [`XorObfuscator`] with an authenticated
//! cipher (e.g. AES-256-GCM) behind the same trait.
//!
//! ## Sealed layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ obfuscate( MAGIC "SKSEAL1\n" ‖ compress(p) ) │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The magic prefix is checked after de-obfuscation, so unsealing with the
//! wrong key material fails with [`CodecError::InvalidMagic`] instead of
//! yielding garbage.
//!
//! ```rust
//! use statekeep_codec::BackupCodec;
//!
//! let codec = BackupCodec::default();
//! let sealed = codec.seal(b"{\"theme\":\"dark\"}", "backup-1").unwrap();
//! assert_ne!(sealed.as_slice(), b"{\"theme\":\"dark\"}");
//!
//! let opened = codec.unseal(&sealed, "backup-1").unwrap();
//! assert_eq!(opened, b"{\"theme\":\"dark\"}");
//! assert!(codec.unseal(&sealed, "backup-2").is_err());
//! ```

pub mod compress;
pub mod error;
pub mod obfuscate;

use std::sync::Arc;

pub use compress::{Compressor, IdentityCompressor};
pub use error::{CodecError, CodecResult};
pub use obfuscate::{derive_key, Obfuscator, XorObfuscator};

/// Magic bytes prefixed to every sealed payload before obfuscation.
pub const MAGIC_SEALED: &[u8; 8] = b"SKSEAL1\n";

/// Compression followed by obfuscation, and the inverse.
#[derive(Clone)]
pub struct BackupCodec {
    compressor: Arc<dyn Compressor>,
    obfuscator: Arc<dyn Obfuscator>,
}

impl Default for BackupCodec {
    fn default() -> Self {
        Self::new(Arc::new(IdentityCompressor), Arc::new(XorObfuscator))
    }
}

impl std::fmt::Debug for BackupCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupCodec")
            .field("compressor", &self.compressor.name())
            .field("obfuscator", &self.obfuscator.name())
            .finish()
    }
}

impl BackupCodec {
    pub fn new(compressor: Arc<dyn Compressor>, obfuscator: Arc<dyn Obfuscator>) -> Self {
        Self {
            compressor,
            obfuscator,
        }
    }

    /// Name of the configured compressor, recorded in backup metadata.
    pub fn compression_name(&self) -> &'static str {
        self.compressor.name()
    }

    /// Compress and obfuscate `plaintext` with a key derived from
    /// `key_material`.
    pub fn seal(&self, plaintext: &[u8], key_material: &str) -> CodecResult<Vec<u8>> {
        let compressed = self.compressor.compress(plaintext)?;

        let mut framed = Vec::with_capacity(MAGIC_SEALED.len() + compressed.len());
        framed.extend_from_slice(MAGIC_SEALED);
        framed.extend_from_slice(&compressed);

        self.obfuscator.obfuscate(&framed, key_material)
    }

    /// Reverse [`seal`](Self::seal).
    pub fn unseal(&self, sealed: &[u8], key_material: &str) -> CodecResult<Vec<u8>> {
        let framed = self.obfuscator.deobfuscate(sealed, key_material)?;

        if framed.len() < MAGIC_SEALED.len() || &framed[..MAGIC_SEALED.len()] != MAGIC_SEALED {
            return Err(CodecError::InvalidMagic);
        }

        self.compressor.decompress(&framed[MAGIC_SEALED.len()..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_unseal_roundtrip() {
        let codec = BackupCodec::default();
        let payload = br#"{"preferences":{"theme":"dark"}}"#;

        let sealed = codec.seal(payload, "0192-backup").unwrap();
        assert_eq!(sealed.len(), payload.len() + MAGIC_SEALED.len());

        let opened = codec.unseal(&sealed, "0192-backup").unwrap();
        assert_eq!(opened.as_slice(), payload.as_slice());
    }

    #[test]
    fn test_unseal_with_wrong_key_fails() {
        let codec = BackupCodec::default();
        let sealed = codec.seal(b"data", "a").unwrap();
        assert!(matches!(
            codec.unseal(&sealed, "b"),
            Err(CodecError::InvalidMagic)
        ));
    }

    #[test]
    fn test_unseal_truncated_input_fails() {
        let codec = BackupCodec::default();
        assert!(matches!(
            codec.unseal(b"abc", "a"),
            Err(CodecError::InvalidMagic)
        ));
    }

    #[test]
    fn test_empty_payload() {
        let codec = BackupCodec::default();
        let sealed = codec.seal(b"", "k").unwrap();
        assert!(codec.unseal(&sealed, "k").unwrap().is_empty());
    }

    #[test]
    fn test_debug_names_stages() {
        let debug = format!("{:?}", BackupCodec::default());
        assert!(debug.contains("identity"));
        assert!(debug.contains("xor"));
    }
}
