//! # statekeep-engine
//!
//! Versioned migration, backup and cross-environment synchronization for
//! persisted application state.
//!
//! - [`BackupManager`]: checksum-verified, obfuscated snapshots of a store
//! - [`MigrationRegistry`] / [`MigrationManager`]: shortest-path migration
//!   through a version graph, with validation at every step and recovery
//!   from the pre-migration backup
//! - [`SyncManager`]: export, layout transformation and import between
//!   environment stores
//! - [`SettingsManager`]: category-validated settings export and merge-import
//!
//! Public operations that mutate a store report failures in their result
//! structs (`success`, `error`, `error_kind`) instead of returning `Err`.
//!
//! ## Concurrency
//!
//! Operations are sequences of storage calls with no internal locking.
//! Callers must not run two mutating operations (migrate, restore, import,
//! sync, settings import) against the same store at the same time.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use statekeep_core::{FieldRule, FieldType, MemoryStorage, Schema, StaticSchemaRegistry};
//! use statekeep_engine::{EngineConfig, FnMigration, MigrationManager, MigrationRegistry};
//!
//! # async fn run() -> statekeep_core::Result<()> {
//! let schema = Schema::new().field("preferences", FieldRule::new(FieldType::Object).required());
//! let schemas = StaticSchemaRegistry::new()
//!     .with_schema("1.0.0", schema.clone())?
//!     .with_schema("1.1.0", schema)?;
//! let registry = MigrationRegistry::new()
//!     .with_migration(FnMigration::new("1.0.0", "1.1.0", "No-op", Ok, Ok))?;
//!
//! let manager = MigrationManager::new(
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(schemas),
//!     Arc::new(registry),
//!     EngineConfig::from_env(),
//! );
//! let result = manager.migrate("1.0.0", "1.1.0").await;
//! println!("migrated: {} ({:?})", result.success, result.error);
//! # Ok(())
//! # }
//! ```

pub mod backup;
mod commit;
pub mod config;
pub mod gate;
pub mod migration;
pub mod settings;
pub mod sync;

pub use backup::{backup_key, strip_sensitive_fields, BackupManager, RestoreResult};
pub use config::EngineConfig;
pub use gate::validate_for_version;
pub use migration::{
    migration_key, FnMigration, Migration, MigrationHistory, MigrationInfo, MigrationManager,
    MigrationRegistry, MigrationResult, RollbackResult,
};
pub use settings::{
    deep_merge, SettingsBackup, SettingsCategory, SettingsImportResult, SettingsManager,
};
pub use sync::{
    can_sync, CompatibilityResult, EnvironmentProfile, ImportResult, SyncManager, SyncResult,
    Transform,
};
