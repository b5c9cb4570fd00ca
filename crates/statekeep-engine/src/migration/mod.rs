//! Versioned data migration.
//!
//! - [`registry`]: the [`Migration`] trait and the version graph with
//!   shortest-path resolution
//! - [`manager`]: [`MigrationManager`], which runs paths against a store with
//!   backup, validation and automatic recovery
//! - [`history`]: the capped migration log

pub mod history;
pub mod manager;
pub mod registry;

pub use history::MigrationHistory;
pub use manager::{MigrationManager, MigrationResult, RollbackResult};
pub use registry::{migration_key, FnMigration, Migration, MigrationInfo, MigrationRegistry};
