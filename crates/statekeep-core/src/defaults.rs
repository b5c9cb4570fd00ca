//! Centralized default constants for statekeep.
//!
//! **This module is the single source of truth** for shared default values
//! and reserved storage keys. Other crates reference these constants instead
//! of defining their own magic numbers.

// =============================================================================
// RETENTION
// =============================================================================

/// Number of full backups kept before the oldest are pruned.
pub const MAX_BACKUPS: usize = 10;

/// Number of migration history records kept (newest first).
pub const HISTORY_LIMIT: usize = 100;

/// Number of settings snapshots kept before the oldest are pruned.
pub const MAX_SETTINGS_BACKUPS: usize = 5;

// =============================================================================
// VERSIONS
// =============================================================================

/// Version assumed for a store that has never recorded a version marker.
pub const DEFAULT_DATA_VERSION: &str = "1.0.0";

/// Format version of exported envelopes (backups, data, settings).
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// Format tag of a portable backup envelope.
pub const BACKUP_EXPORT_FORMAT: &str = "statekeep-backup";

// =============================================================================
// RESERVED STORAGE KEYS
// =============================================================================

/// Key holding the stored data version marker.
pub const VERSION_KEY: &str = "__version";

/// Key holding the migration history log.
pub const HISTORY_KEY: &str = "__migration_history";

/// Key holding the checksum of the last committed data set.
pub const DATA_CHECKSUM_KEY: &str = "__data_checksum";

/// Prefix reserved for engine bookkeeping keys.
pub const INTERNAL_KEY_PREFIX: &str = "__";

/// Prefix of keys holding full backups (`backup_<id>`).
pub const BACKUP_KEY_PREFIX: &str = "backup_";

/// Prefix of keys holding settings snapshots (`settings_backup_<id>`).
pub const SETTINGS_BACKUP_KEY_PREFIX: &str = "settings_backup_";

// =============================================================================
// METADATA
// =============================================================================

/// Default locale stamped on exports.
pub const LOCALE: &str = "en-US";

/// Default timezone stamped on exports.
pub const TIMEZONE: &str = "UTC";

/// Default user agent stamped on backups and exports.
pub const USER_AGENT: &str = concat!("statekeep/", env!("CARGO_PKG_VERSION"));

/// Top-level fields removed from backups created without sensitive data.
///
/// Matched at any depth of the data tree.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "voiceTrainingData",
    "analyticsRawData",
    "debugLogs",
    "sessionData",
];
