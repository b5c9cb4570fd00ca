//! Cross-environment synchronization.
//!
//! Each environment stores data in its own [`StorageLayout`]: a flat store, or
//! one partitioned into storage areas. [`SyncManager`] exports a store,
//! reshapes it with the [`transforms`] pipeline for the target layout,
//! validates it against the target [`EnvironmentProfile`] and imports it
//! behind a backup of the target store.
//!
//! [`StorageLayout`]: statekeep_core::StorageLayout

pub mod environment;
pub mod manager;
pub mod transforms;

pub use environment::{can_sync, sync_targets, EnvironmentProfile};
pub use manager::{CompatibilityResult, ImportResult, SyncManager, SyncResult};
pub use transforms::{plan, Transform};
