//! Content digests used wherever integrity must be verified.
//!
//! All digests are SHA-256 rendered as lowercase hex.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Digest of a byte payload.
pub fn checksum_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Digest of a text payload.
pub fn checksum_str(data: &str) -> String {
    checksum_bytes(data.as_bytes())
}

/// Digest of a value's compact JSON serialization.
///
/// `serde_json` maps keep their keys sorted, so equal values always
/// serialize, and therefore hash, identically.
pub fn checksum_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(checksum_bytes(&bytes))
}

/// Compare a payload against an expected digest.
pub fn verify_checksum(data: &[u8], expected: &str) -> bool {
    checksum_bytes(data).eq_ignore_ascii_case(expected.trim())
}
