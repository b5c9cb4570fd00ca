//! User-settings export and merge-import.

pub mod category;
pub mod manager;
pub mod merge;

pub use category::SettingsCategory;
pub use manager::{settings_backup_key, SettingsBackup, SettingsImportResult, SettingsManager};
pub use merge::deep_merge;
