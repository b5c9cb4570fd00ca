//! In-memory storage backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{ensure_no_reserved_keys, is_reserved_key, Storage};
use crate::error::Result;
use crate::models::DataMap;

/// Process-local store. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `data`.
    pub fn with_data(data: DataMap) -> Self {
        Self {
            entries: Arc::new(RwLock::new(data.into_iter().collect())),
        }
    }

    /// Copy of every entry, reserved keys included.
    pub async fn snapshot(&self) -> BTreeMap<String, Value> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    /// Replaces application data under a single write lock.
    async fn save_all_data(&self, data: DataMap) -> Result<()> {
        ensure_no_reserved_keys(&data)?;

        let mut entries = self.entries.write().await;
        entries.retain(|key, _| is_reserved_key(key));
        entries.extend(data);
        Ok(())
    }
}
