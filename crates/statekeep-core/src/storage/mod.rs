//! The key-value storage primitive the engine persists through.
//!
//! Backends implement the four primitive operations; the bulk and version
//! marker operations have provided implementations built on top of them that
//! backends may override (e.g. to make `save_all_data` atomic).

mod file;
mod memory;

pub use file::JsonFileStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use serde_json::Value;

use crate::defaults::{
    BACKUP_KEY_PREFIX, INTERNAL_KEY_PREFIX, SETTINGS_BACKUP_KEY_PREFIX, VERSION_KEY,
};
use crate::error::{Error, Result};
use crate::models::DataMap;

/// Keys used for engine bookkeeping rather than application data.
///
/// Reserved keys are excluded from `load_all_data` and left untouched by
/// `save_all_data`. The reservation is by prefix: besides `__`, any key
/// starting with `backup_` or `settings_backup_` belongs to the engine, so an
/// application key such as `backup_frequency` is not application data. Nest
/// such values under a category (`preferences.backupFrequency`) instead.
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(INTERNAL_KEY_PREFIX)
        || key.starts_with(BACKUP_KEY_PREFIX)
        || key.starts_with(SETTINGS_BACKUP_KEY_PREFIX)
}

/// Async key-value store.
///
/// The store is shared between application data and engine bookkeeping;
/// see [`is_reserved_key`] for the key prefixes the engine owns. Bulk
/// writes containing a reserved key are rejected with
/// [`Error::InvalidInput`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a value; `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any existing one.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Delete a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// All keys currently present, reserved ones included.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Load every non-reserved key.
    async fn load_all_data(&self) -> Result<DataMap> {
        let mut data = DataMap::new();
        for key in self.keys().await? {
            if is_reserved_key(&key) {
                continue;
            }
            if let Some(value) = self.get(&key).await? {
                data.insert(key, value);
            }
        }
        Ok(data)
    }

    /// Replace the application data with `data`.
    ///
    /// Non-reserved keys missing from `data` are removed. The default
    /// implementation is not atomic; backends that can commit in one step
    /// override it.
    async fn save_all_data(&self, data: DataMap) -> Result<()> {
        ensure_no_reserved_keys(&data)?;

        for key in self.keys().await? {
            if !is_reserved_key(&key) && !data.contains_key(&key) {
                self.remove(&key).await?;
            }
        }
        for (key, value) in data {
            self.set(&key, value).await?;
        }
        Ok(())
    }

    /// Read the stored data version marker.
    async fn get_version(&self) -> Result<Option<String>> {
        match self.get(VERSION_KEY).await? {
            None => Ok(None),
            Some(Value::String(version)) => Ok(Some(version)),
            Some(other) => Err(Error::Storage(format!(
                "Version marker is not a string: {}",
                other
            ))),
        }
    }

    /// Write the stored data version marker.
    async fn set_version(&self, version: &str) -> Result<()> {
        self.set(VERSION_KEY, Value::String(version.to_string()))
            .await
    }
}

/// Reject application data that would overwrite engine bookkeeping.
pub(crate) fn ensure_no_reserved_keys(data: &DataMap) -> Result<()> {
    if let Some(key) = data.keys().find(|key| is_reserved_key(key)) {
        return Err(Error::InvalidInput(format!(
            "Data contains reserved key '{}'",
            key
        )));
    }
    Ok(())
}
