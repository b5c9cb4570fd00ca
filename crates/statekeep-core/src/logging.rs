//! Structured logging schema for statekeep.
//!
//! Every crate logs through `tracing` with the field names listed here so
//! that log aggregation can query migrations, backups and syncs uniformly.
//! Field names are written literally in the macros; these constants are the
//! reference list.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Data may be left inconsistent, requires attention (failed rollback) |
//! | WARN  | Recoverable issue, operation aborted or automatic rollback applied |
//! | INFO  | Operation completions (migration, backup, restore, import) |
//! | DEBUG | Decision points, resolved paths, pruning |
//! | TRACE | Per-step and per-item detail |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "migration", "backup", "sync", "settings", "storage"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "manager", "registry", "history", "pipeline", "file_store"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "migrate", "rollback", "create", "restore", "import"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Version the operation starts from.
pub const FROM_VERSION: &str = "from_version";

/// Version the operation targets.
pub const TO_VERSION: &str = "to_version";

/// Version marker written or read by the operation.
pub const VERSION: &str = "version";

/// Backup id involved in the operation.
pub const BACKUP_ID: &str = "backup_id";

/// Snapshot taken before a restore overwrites the store.
pub const SAFETY_BACKUP_ID: &str = "safety_backup_id";

/// Id an imported backup was renamed to after a collision.
pub const NEW_BACKUP_ID: &str = "new_backup_id";

/// Environment whose store is read or written.
pub const ENVIRONMENT: &str = "environment";

/// Source environment of a sync.
pub const FROM_ENV: &str = "from_env";

/// Target environment of a sync.
pub const TO_ENV: &str = "to_env";

/// Migration key (`<from>-to-<to>`).
pub const MIGRATION_KEY: &str = "migration_key";

/// Storage key of a skipped or malformed entry.
pub const KEY: &str = "key";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of top-level items read or written.
pub const ITEM_COUNT: &str = "item_count";

/// Number of migration steps applied or reverted.
pub const STEP_COUNT: &str = "step_count";

/// Backup retention cap in effect during pruning.
pub const MAX_BACKUPS: &str = "max_backups";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Whether the pre-operation snapshot was put back after a failure.
pub const ROLLED_BACK: &str = "rolled_back";

/// Whether a backup kept sensitive fields.
pub const INCLUDE_SENSITIVE_DATA: &str = "include_sensitive_data";

/// Error category tag (`Error::kind`).
pub const ERROR_KIND: &str = "error_kind";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
