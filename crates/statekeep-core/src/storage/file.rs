//! Single-document JSON file backend.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::{ensure_no_reserved_keys, is_reserved_key, Storage};
use crate::error::{Error, Result};
use crate::models::DataMap;

/// Stores every key in one JSON object on disk.
///
/// Writes go to a sibling temp file that is then renamed over the document,
/// so each write, including a bulk `save_all_data`, either fully lands or
/// leaves the previous document in place. Access from multiple processes is
/// not coordinated.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<BTreeMap<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::Storage(format!(
                    "Failed to parse store document {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(Error::Storage(format!(
                "Failed to read store document {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn write_document(&self, document: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(document)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes).await.map_err(|e| {
            Error::Storage(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            Error::Storage(format!(
                "Failed to replace store document {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(
            subsystem = "storage",
            component = "file_store",
            op = "write",
            item_count = document.len(),
            "Store document written"
        );
        Ok(())
    }
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_document().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        document.insert(key.to_string(), value);
        self.write_document(&document).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        if document.remove(key).is_some() {
            self.write_document(&document).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_document().await?.into_keys().collect())
    }

    async fn load_all_data(&self) -> Result<DataMap> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_document()
            .await?
            .into_iter()
            .filter(|(key, _)| !is_reserved_key(key))
            .collect())
    }

    async fn save_all_data(&self, data: DataMap) -> Result<()> {
        ensure_no_reserved_keys(&data)?;

        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        document.retain(|key, _| is_reserved_key(key));
        document.extend(data);
        self.write_document(&document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let temp = tempdir().unwrap();
        let store = JsonFileStorage::new(temp.path().join("store.json"));
        assert!(store.keys().await.unwrap().is_empty());
        assert!(store.get("x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_values_persist_across_instances() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested/store.json");

        let store = JsonFileStorage::new(&path);
        store.set("preferences", json!({"theme": "dark"})).await.unwrap();
        store.set_version("1.1.0").await.unwrap();

        let reopened = JsonFileStorage::new(&path);
        assert_eq!(
            reopened.get("preferences").await.unwrap(),
            Some(json!({"theme": "dark"}))
        );
        assert_eq!(reopened.get_version().await.unwrap().as_deref(), Some("1.1.0"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_all_data_keeps_reserved_keys() {
        let temp = tempdir().unwrap();
        let store = JsonFileStorage::new(temp.path().join("store.json"));
        store.set("stale", json!(1)).await.unwrap();
        store.set_version("2.0.0").await.unwrap();

        let mut data = DataMap::new();
        data.insert("fresh".to_string(), json!(2));
        store.save_all_data(data).await.unwrap();

        let loaded = store.load_all_data().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["fresh"], json!(2));
        assert_eq!(store.get_version().await.unwrap().as_deref(), Some("2.0.0"));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_storage_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = JsonFileStorage::new(&path);
        let err = store.keys().await.unwrap_err();
        assert_eq!(err.kind(), "storage");
    }
}
