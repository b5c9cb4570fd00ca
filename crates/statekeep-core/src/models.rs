//! Persisted and portable envelope formats.
//!
//! Field names serialize in camelCase so envelopes written by other
//! implementations of the same format can be read back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::checksum::checksum_json;
use crate::defaults::{BACKUP_EXPORT_FORMAT, EXPORT_FORMAT_VERSION};
use crate::environment::Environment;
use crate::error::{Error, Result};

/// The live data set: top-level key to JSON value.
pub type DataMap = Map<String, Value>;

/// Current time as Unix milliseconds, the timestamp unit of every envelope.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// BACKUPS
// =============================================================================

/// Descriptive metadata recorded with every backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub environment: Environment,
    pub user_agent: String,
    pub extension_version: String,
    pub include_sensitive_data: bool,
    /// Name of the compressor applied to the payload.
    #[serde(default = "default_compression")]
    pub compression: String,
    /// Number of top-level items captured.
    #[serde(default)]
    pub item_count: usize,
}

fn default_compression() -> String {
    "identity".to_string()
}

/// A self-describing, checksum-verified snapshot of the whole store.
///
/// `data` holds the serialized, compressed and obfuscated payload; the
/// checksum is computed over exactly these bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    pub id: String,
    pub timestamp: i64,
    pub version: String,
    pub size: usize,
    pub checksum: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub metadata: BackupMetadata,
}

/// Backup listing entry without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub id: String,
    pub timestamp: i64,
    pub version: String,
    pub size: usize,
    pub metadata: BackupMetadata,
}

impl From<&BackupData> for BackupInfo {
    fn from(backup: &BackupData) -> Self {
        Self {
            id: backup.id.clone(),
            timestamp: backup.timestamp,
            version: backup.version.clone(),
            size: backup.size,
            metadata: backup.metadata.clone(),
        }
    }
}

/// Portable wrapper used to move a backup between installations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupExport {
    pub format: String,
    pub format_version: u32,
    pub exported_at: i64,
    pub backup: BackupData,
    /// Digest of the serialized `backup` field.
    pub checksum: String,
}

impl BackupExport {
    /// Wrap a backup, sealing the envelope with a digest of the backup.
    pub fn new(backup: BackupData) -> Result<Self> {
        let checksum = checksum_json(&backup)?;
        Ok(Self {
            format: BACKUP_EXPORT_FORMAT.to_string(),
            format_version: EXPORT_FORMAT_VERSION,
            exported_at: now_millis(),
            backup,
            checksum,
        })
    }

    /// Check the format tag and the envelope digest.
    pub fn verify(&self) -> Result<()> {
        if self.format != BACKUP_EXPORT_FORMAT {
            return Err(Error::Validation(format!(
                "Unsupported backup export format: {}",
                self.format
            )));
        }
        if self.format_version > EXPORT_FORMAT_VERSION {
            return Err(Error::Compatibility(format!(
                "Backup export format version {} is newer than supported version {}",
                self.format_version, EXPORT_FORMAT_VERSION
            )));
        }
        if checksum_json(&self.backup)? != self.checksum {
            return Err(Error::Integrity(format!(
                "Backup export checksum mismatch for backup {}",
                self.backup.id
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Serialization(format!("Invalid backup export: {}", e)))
    }
}

// =============================================================================
// CROSS-ENVIRONMENT EXPORTS
// =============================================================================

/// Environment description attached to a data export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub user_agent: String,
    pub extension_version: String,
    pub platform: String,
    pub locale: String,
    pub timezone: String,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default)]
    pub item_count: usize,
    /// Environment the data was originally exported from, when it has since
    /// been transformed for another one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_environment: Option<Environment>,
    /// Names of the transformations applied, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<String>,
}

/// Data exported from one environment, ready for transfer to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedData {
    pub version: String,
    pub environment: Environment,
    pub timestamp: i64,
    pub data: DataMap,
    pub metadata: ExportMetadata,
    /// Digest of the serialized `data` field.
    pub checksum: String,
}

// =============================================================================
// MIGRATION HISTORY
// =============================================================================

/// One entry of the append-only migration log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationHistoryRecord {
    pub from_version: String,
    pub to_version: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
    pub applied_migrations: Vec<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Metadata attached to a settings export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsMetadata {
    pub categories: Vec<String>,
    pub extension_version: String,
    pub user_agent: String,
}

/// Export of the user-settings categories only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsExport {
    pub version: String,
    pub browser: Environment,
    pub timestamp: i64,
    pub settings: DataMap,
    pub metadata: SettingsMetadata,
    /// Digest of the serialized `settings` field.
    pub checksum: String,
}

/// Serde adapter storing raw bytes as standard base64 text.
pub mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| serde::de::Error::custom(format!("Invalid base64: {}", e)))
    }
}
