//! Writes that end an engine operation.

use serde_json::Value;

use statekeep_core::defaults::DATA_CHECKSUM_KEY;
use statekeep_core::{checksum_json, DataMap, Result, Storage};

/// Replace the live data, move the version marker and record the data
/// checksum, in that order.
pub(crate) async fn commit_data(storage: &dyn Storage, data: DataMap, version: &str) -> Result<()> {
    let checksum = checksum_json(&data)?;
    storage.save_all_data(data).await?;
    storage.set_version(version).await?;
    storage
        .set(DATA_CHECKSUM_KEY, Value::String(checksum))
        .await
}

/// Recompute the data checksum after writes that bypass `commit_data`.
pub(crate) async fn refresh_data_checksum(storage: &dyn Storage) -> Result<()> {
    let data = storage.load_all_data().await?;
    let checksum = checksum_json(&data)?;
    storage
        .set(DATA_CHECKSUM_KEY, Value::String(checksum))
        .await
}

/// Checksum recorded by the last commit, if any.
pub(crate) async fn stored_data_checksum(storage: &dyn Storage) -> Result<Option<String>> {
    Ok(storage
        .get(DATA_CHECKSUM_KEY)
        .await?
        .and_then(|value| value.as_str().map(str::to_string)))
}

/// Stored version marker, or `default` for a store that never recorded one.
pub(crate) async fn version_or_default(storage: &dyn Storage, default: &str) -> Result<String> {
    Ok(storage
        .get_version()
        .await?
        .unwrap_or_else(|| default.to_string()))
}
