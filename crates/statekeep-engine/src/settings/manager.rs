//! Export and merge-import of user settings.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use statekeep_core::defaults::SETTINGS_BACKUP_KEY_PREFIX;
use statekeep_core::{
    checksum_json, is_valid_version, now_millis, DataMap, Error, Result, SettingsExport,
    SettingsMetadata, Storage, ValidationResult,
};

use super::category::SettingsCategory;
use super::merge::deep_merge;
use crate::commit::{refresh_data_checksum, version_or_default};
use crate::config::EngineConfig;

/// Snapshot of the settings categories taken before a settings write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsBackup {
    pub id: String,
    pub timestamp: i64,
    pub settings: DataMap,
    pub checksum: String,
}

/// Outcome of [`SettingsManager::import_settings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsImportResult {
    pub success: bool,
    pub imported_categories: Vec<String>,
    /// Keys in the export that are not settings categories.
    pub skipped_categories: Vec<String>,
    pub backup_id: Option<String>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}

/// Storage key of a settings snapshot.
pub fn settings_backup_key(id: &str) -> String {
    format!("{}{}", SETTINGS_BACKUP_KEY_PREFIX, id)
}

/// Manages the settings categories of one store.
#[derive(Clone)]
pub struct SettingsManager {
    storage: Arc<dyn Storage>,
    config: EngineConfig,
}

impl SettingsManager {
    pub fn new(storage: Arc<dyn Storage>, config: EngineConfig) -> Self {
        Self { storage, config }
    }

    /// Export the given categories, or all of them. Categories absent from
    /// the store are left out.
    pub async fn export_settings(
        &self,
        categories: Option<&[SettingsCategory]>,
    ) -> Result<SettingsExport> {
        let categories = categories.unwrap_or(&SettingsCategory::ALL);
        let settings = self.read_categories(categories).await?;

        Ok(SettingsExport {
            version: version_or_default(self.storage.as_ref(), &self.config.default_version)
                .await?,
            browser: self.config.environment,
            timestamp: now_millis(),
            metadata: SettingsMetadata {
                categories: settings.keys().cloned().collect(),
                extension_version: self.config.extension_version.clone(),
                user_agent: self.config.user_agent.clone(),
            },
            checksum: checksum_json(&settings)?,
            settings,
        })
    }

    /// Check an export's envelope, checksum and every known category.
    /// Unknown categories are warnings.
    pub fn validate_settings(&self, export: &SettingsExport) -> ValidationResult {
        let mut result = ValidationResult::valid();

        if !is_valid_version(&export.version) {
            result.add_error(format!("Invalid settings version: {}", export.version));
        }
        match checksum_json(&export.settings) {
            Ok(actual) if actual == export.checksum => {}
            Ok(_) => result.add_error("Settings checksum mismatch"),
            Err(e) => result.add_error(format!("Could not compute settings checksum: {}", e)),
        }

        for (key, value) in &export.settings {
            match key.parse::<SettingsCategory>() {
                Ok(category) => result.merge(category.validate(value)),
                Err(_) => result.add_warning(format!("Unknown settings category '{}' skipped", key)),
            }
        }
        result
    }

    /// Merge an export into the stored settings.
    ///
    /// Nothing is written unless the whole export validates. The current
    /// settings are snapshotted first, and the snapshot is put back if a
    /// write fails.
    pub async fn import_settings(&self, export: SettingsExport) -> SettingsImportResult {
        let validation = self.validate_settings(&export);
        let warnings = validation.warnings.clone();

        let outcome = match validation.into_result("Invalid settings") {
            Ok(_) => self.merge_settings(export.settings).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok((backup_id, imported, skipped)) => {
                info!(
                    subsystem = "settings",
                    component = "manager",
                    op = "import",
                    backup_id = %backup_id,
                    item_count = imported.len(),
                    "Settings imported"
                );
                SettingsImportResult {
                    success: true,
                    imported_categories: imported,
                    skipped_categories: skipped,
                    backup_id: Some(backup_id),
                    warnings,
                    error: None,
                    error_kind: None,
                }
            }
            Err(e) => {
                warn!(
                    subsystem = "settings",
                    component = "manager",
                    op = "import",
                    error_kind = e.kind(),
                    error = %e,
                    "Settings import rejected"
                );
                SettingsImportResult {
                    success: false,
                    imported_categories: Vec::new(),
                    skipped_categories: Vec::new(),
                    backup_id: None,
                    warnings,
                    error: Some(e.to_string()),
                    error_kind: Some(e.kind().to_string()),
                }
            }
        }
    }

    async fn merge_settings(
        &self,
        incoming: DataMap,
    ) -> Result<(String, Vec<String>, Vec<String>)> {
        let snapshot = self.create_settings_backup().await?;

        let mut merged = Vec::new();
        let mut skipped = Vec::new();
        for (key, value) in incoming {
            let Ok(category) = key.parse::<SettingsCategory>() else {
                skipped.push(key);
                continue;
            };
            let mut current = self
                .storage
                .get(category.key())
                .await?
                .unwrap_or(Value::Null);
            deep_merge(&mut current, value);
            merged.push((category, current));
        }

        let mut imported = Vec::new();
        for (category, value) in merged {
            if let Err(e) = self.storage.set(category.key(), value).await {
                self.recover(&snapshot).await;
                return Err(e);
            }
            imported.push(category.key().to_string());
        }

        if let Err(e) = refresh_data_checksum(self.storage.as_ref()).await {
            warn!(
                subsystem = "settings",
                component = "manager",
                op = "import",
                error = %e,
                "Failed to refresh data checksum"
            );
        }
        Ok((snapshot.id, imported, skipped))
    }

    /// Snapshot the current settings categories.
    pub async fn create_settings_backup(&self) -> Result<SettingsBackup> {
        let settings = self.read_categories(&SettingsCategory::ALL).await?;
        let backup = SettingsBackup {
            id: Uuid::now_v7().to_string(),
            timestamp: now_millis(),
            checksum: checksum_json(&settings)?,
            settings,
        };

        self.storage
            .set(&settings_backup_key(&backup.id), serde_json::to_value(&backup)?)
            .await?;
        self.prune_settings_backups().await?;
        Ok(backup)
    }

    /// Stored settings snapshots, newest first.
    pub async fn list_settings_backups(&self) -> Result<Vec<SettingsBackup>> {
        let mut backups = Vec::new();
        for key in self.storage.keys().await? {
            if !key.starts_with(SETTINGS_BACKUP_KEY_PREFIX) {
                continue;
            }
            let Some(value) = self.storage.get(&key).await? else {
                continue;
            };
            match serde_json::from_value::<SettingsBackup>(value) {
                Ok(backup) => backups.push(backup),
                Err(e) => warn!(
                    subsystem = "settings",
                    component = "manager",
                    op = "list",
                    key = %key,
                    error = %e,
                    "Skipping malformed settings backup"
                ),
            }
        }
        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(backups)
    }

    /// Replace the settings categories with a snapshot. Categories absent
    /// from the snapshot are removed. Returns the number of categories
    /// restored.
    pub async fn restore_settings_backup(&self, id: &str) -> Result<usize> {
        let value = self
            .storage
            .get(&settings_backup_key(id))
            .await?
            .ok_or_else(|| Error::NotFound(format!("Settings backup {}", id)))?;
        let backup: SettingsBackup = serde_json::from_value(value)?;

        if checksum_json(&backup.settings)? != backup.checksum {
            return Err(Error::Integrity(format!(
                "Checksum mismatch: corrupted settings backup {}",
                id
            )));
        }

        self.write_snapshot(&backup).await?;
        refresh_data_checksum(self.storage.as_ref()).await?;

        info!(
            subsystem = "settings",
            component = "manager",
            op = "restore",
            backup_id = %id,
            item_count = backup.settings.len(),
            "Settings backup restored"
        );
        Ok(backup.settings.len())
    }

    /// Remove one category after snapshotting the settings. Returns the
    /// snapshot id.
    pub async fn reset_category(&self, category: SettingsCategory) -> Result<String> {
        let snapshot = self.create_settings_backup().await?;
        self.storage.remove(category.key()).await?;
        refresh_data_checksum(self.storage.as_ref()).await?;
        Ok(snapshot.id)
    }

    async fn read_categories(&self, categories: &[SettingsCategory]) -> Result<DataMap> {
        let mut settings = DataMap::new();
        for category in categories {
            if let Some(value) = self.storage.get(category.key()).await? {
                settings.insert(category.key().to_string(), value);
            }
        }
        Ok(settings)
    }

    async fn write_snapshot(&self, backup: &SettingsBackup) -> Result<()> {
        for category in SettingsCategory::ALL {
            match backup.settings.get(category.key()) {
                Some(value) => self.storage.set(category.key(), value.clone()).await?,
                None => self.storage.remove(category.key()).await?,
            }
        }
        Ok(())
    }

    async fn recover(&self, snapshot: &SettingsBackup) {
        match self.write_snapshot(snapshot).await {
            Ok(()) => warn!(
                subsystem = "settings",
                component = "manager",
                op = "import",
                backup_id = %snapshot.id,
                "Settings write failed, snapshot restored"
            ),
            Err(e) => error!(
                subsystem = "settings",
                component = "manager",
                op = "import",
                backup_id = %snapshot.id,
                error = %e,
                "Settings write failed and the snapshot could not be restored"
            ),
        }
    }

    async fn prune_settings_backups(&self) -> Result<()> {
        let backups = self.list_settings_backups().await?;
        for backup in backups.iter().skip(self.config.max_settings_backups) {
            self.storage.remove(&settings_backup_key(&backup.id)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use statekeep_core::MemoryStorage;

    fn seeded() -> MemoryStorage {
        let mut data = DataMap::new();
        data.insert(
            "preferences".to_string(),
            json!({"theme": "dark", "layout": {"compact": true, "density": 2}}),
        );
        data.insert("voiceSettings".to_string(), json!({"sensitivity": 0.4}));
        data.insert("cache".to_string(), json!({"entries": 3}));
        MemoryStorage::with_data(data)
    }

    fn manager(storage: &MemoryStorage) -> SettingsManager {
        SettingsManager::new(Arc::new(storage.clone()), EngineConfig::default())
    }

    fn export_of(settings: Value) -> SettingsExport {
        let settings = settings.as_object().cloned().unwrap();
        SettingsExport {
            version: "1.0.0".to_string(),
            browser: statekeep_core::Environment::Firefox,
            timestamp: 1,
            metadata: SettingsMetadata {
                categories: settings.keys().cloned().collect(),
                extension_version: "1.0.0".to_string(),
                user_agent: "test".to_string(),
            },
            checksum: checksum_json(&settings).unwrap(),
            settings,
        }
    }

    #[tokio::test]
    async fn test_export_only_settings_categories() {
        let storage = seeded();
        let export = manager(&storage).export_settings(None).await.unwrap();

        assert_eq!(export.metadata.categories, vec!["preferences", "voiceSettings"]);
        assert!(!export.settings.contains_key("cache"));
        assert!(manager(&storage).validate_settings(&export).is_valid);

        let only = manager(&storage)
            .export_settings(Some([SettingsCategory::VoiceSettings].as_slice()))
            .await
            .unwrap();
        assert_eq!(only.settings.len(), 1);
    }

    #[tokio::test]
    async fn test_import_deep_merges() {
        let storage = seeded();
        let settings = manager(&storage);

        let result = settings
            .import_settings(export_of(json!({
                "preferences": {"layout": {"density": 3}},
                "theme": {"mode": "dark"},
                "fonts": {"size": 12}
            })))
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.imported_categories, vec!["preferences", "theme"]);
        assert_eq!(result.skipped_categories, vec!["fonts"]);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(
            storage.get("preferences").await.unwrap().unwrap(),
            json!({"theme": "dark", "layout": {"compact": true, "density": 3}})
        );
        assert_eq!(storage.get("theme").await.unwrap().unwrap(), json!({"mode": "dark"}));
        assert!(storage.get("fonts").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_category_aborts_without_writes() {
        let storage = seeded();
        let before = storage.snapshot().await;

        let result = manager(&storage)
            .import_settings(export_of(json!({
                "preferences": {"theme": "light"},
                "privacy": {"dataRetentionDays": 400}
            })))
            .await;

        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("validation"));
        assert!(result.error.unwrap().contains("dataRetentionDays"));
        assert_eq!(storage.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_checksum_mismatch_rejected() {
        let storage = seeded();
        let mut export = export_of(json!({"theme": {"mode": "light"}}));
        export.settings.insert("theme".to_string(), json!({"mode": "dark"}));

        let result = manager(&storage).import_settings(export).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("checksum"));
    }

    #[tokio::test]
    async fn test_restore_settings_backup_undoes_import() {
        let storage = seeded();
        let settings = manager(&storage);
        let original = settings.export_settings(None).await.unwrap().settings;

        let result = settings
            .import_settings(export_of(json!({"analytics": {"enabled": true}})))
            .await;
        let backup_id = result.backup_id.unwrap();
        assert!(storage.get("analytics").await.unwrap().is_some());

        let restored = settings.restore_settings_backup(&backup_id).await.unwrap();
        assert_eq!(restored, 2);
        assert_eq!(settings.export_settings(None).await.unwrap().settings, original);
    }

    #[tokio::test]
    async fn test_settings_backups_are_capped() {
        let storage = seeded();
        let settings = SettingsManager::new(
            Arc::new(storage.clone()),
            EngineConfig::default().with_max_settings_backups(2),
        );
        for _ in 0..4 {
            settings.create_settings_backup().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        assert_eq!(settings.list_settings_backups().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_category() {
        let storage = seeded();
        let settings = manager(&storage);
        let snapshot = settings
            .reset_category(SettingsCategory::VoiceSettings)
            .await
            .unwrap();

        assert!(storage.get("voiceSettings").await.unwrap().is_none());
        settings.restore_settings_backup(&snapshot).await.unwrap();
        assert_eq!(
            storage.get("voiceSettings").await.unwrap().unwrap(),
            json!({"sensitivity": 0.4})
        );
    }
}
