//! Capped, newest-first migration log.

use std::sync::Arc;

use statekeep_core::defaults::HISTORY_KEY;
use statekeep_core::{Error, MigrationHistoryRecord, Result, Storage};

/// Migration history persisted under the reserved history key.
#[derive(Clone)]
pub struct MigrationHistory {
    storage: Arc<dyn Storage>,
    limit: usize,
}

impl MigrationHistory {
    pub fn new(storage: Arc<dyn Storage>, limit: usize) -> Self {
        Self {
            storage,
            limit: limit.max(1),
        }
    }

    /// All records, newest first.
    pub async fn load(&self) -> Result<Vec<MigrationHistoryRecord>> {
        match self.storage.get(HISTORY_KEY).await? {
            None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|e| {
                Error::Serialization(format!("Migration history is malformed: {}", e))
            }),
        }
    }

    /// Prepend a record, dropping the oldest beyond the cap.
    pub async fn append(&self, record: MigrationHistoryRecord) -> Result<()> {
        let mut records = self.load().await?;
        records.insert(0, record);
        records.truncate(self.limit);
        self.storage
            .set(HISTORY_KEY, serde_json::to_value(&records)?)
            .await
    }

    pub async fn clear(&self) -> Result<()> {
        self.storage.remove(HISTORY_KEY).await
    }
}
