//! Integration tests for settings export, merge-import and snapshots.

mod common;

use std::sync::Arc;

use serde_json::json;
use statekeep_core::{checksum_json, MemoryStorage, SettingsExport, Storage};
use statekeep_engine::{SettingsCategory, SettingsManager};

use common::{config, data, store_at, FailingStorage};

async fn settings_store() -> MemoryStorage {
    store_at(
        "1.0.0",
        data(json!({
            "preferences": {"language": "en", "wakeWord": "hey"},
            "privacy": {"dataRetentionDays": 30},
            "unrelated": {"kept": true}
        })),
    )
    .await
}

fn export_of(settings: serde_json::Value) -> SettingsExport {
    let settings = data(settings);
    SettingsExport {
        version: "1.0.0".to_string(),
        browser: statekeep_core::Environment::Firefox,
        timestamp: 0,
        metadata: statekeep_core::SettingsMetadata {
            categories: settings.keys().cloned().collect(),
            extension_version: "1.0.0".to_string(),
            user_agent: "test".to_string(),
        },
        checksum: checksum_json(&settings).unwrap(),
        settings,
    }
}

#[tokio::test]
async fn test_export_only_includes_settings_categories() {
    let storage = settings_store().await;
    let manager = SettingsManager::new(Arc::new(storage), config());

    let export = manager.export_settings(None).await.unwrap();
    assert_eq!(
        export.settings.keys().collect::<Vec<_>>(),
        vec!["preferences", "privacy"]
    );
    assert_eq!(export.checksum, checksum_json(&export.settings).unwrap());
    assert!(manager.validate_settings(&export).is_valid);

    let only_privacy = manager
        .export_settings(Some([SettingsCategory::Privacy].as_slice()))
        .await
        .unwrap();
    assert_eq!(only_privacy.metadata.categories, vec!["privacy"]);
}

#[tokio::test]
async fn test_import_deep_merges_into_existing() {
    common::init_tracing();
    let storage = settings_store().await;
    let manager = SettingsManager::new(Arc::new(storage.clone()), config());

    let result = manager
        .import_settings(export_of(json!({
            "preferences": {"language": "de"},
            "theme": {"mode": "dark", "accentColor": "#1A2B3C"}
        })))
        .await;

    assert!(result.success, "import failed: {:?}", result.error);
    assert_eq!(result.imported_categories, vec!["preferences", "theme"]);
    assert!(result.backup_id.is_some());

    assert_eq!(
        storage.get("preferences").await.unwrap(),
        Some(json!({"language": "de", "wakeWord": "hey"}))
    );
    assert_eq!(
        storage.get("theme").await.unwrap(),
        Some(json!({"mode": "dark", "accentColor": "#1A2B3C"}))
    );
    assert_eq!(
        storage.get("unrelated").await.unwrap(),
        Some(json!({"kept": true}))
    );
}

#[tokio::test]
async fn test_invalid_category_aborts_without_writes() {
    let storage = settings_store().await;
    let manager = SettingsManager::new(Arc::new(storage.clone()), config());
    let before = storage.snapshot().await;

    let result = manager
        .import_settings(export_of(json!({
            "preferences": {"language": "de"},
            "privacy": {"dataRetentionDays": 0}
        })))
        .await;

    assert!(!result.success);
    assert_eq!(result.error_kind.as_deref(), Some("validation"));
    assert!(result.error.unwrap().contains("privacy"));
    assert_eq!(storage.snapshot().await, before);
}

#[tokio::test]
async fn test_preferences_theme_outside_enum_is_rejected() {
    let storage = settings_store().await;
    let manager = SettingsManager::new(Arc::new(storage.clone()), config());
    let before = storage.snapshot().await;

    let result = manager
        .import_settings(export_of(json!({"preferences": {"theme": "neon"}})))
        .await;

    assert!(!result.success);
    assert_eq!(result.error_kind.as_deref(), Some("validation"));
    assert!(result.error.unwrap().contains("preferences"));
    assert_eq!(storage.snapshot().await, before);
}

#[tokio::test]
async fn test_unknown_category_is_skipped_with_warning() {
    let storage = settings_store().await;
    let manager = SettingsManager::new(Arc::new(storage.clone()), config());

    let result = manager
        .import_settings(export_of(json!({
            "analytics": {"enabled": false, "sampleRate": 0.1},
            "fonts": {"size": 14}
        })))
        .await;

    assert!(result.success, "import failed: {:?}", result.error);
    assert_eq!(result.imported_categories, vec!["analytics"]);
    assert_eq!(result.skipped_categories, vec!["fonts"]);
    assert!(result.warnings.iter().any(|w| w.contains("fonts")));
    assert!(storage.get("fonts").await.unwrap().is_none());
}

#[tokio::test]
async fn test_tampered_settings_rejected() {
    let storage = settings_store().await;
    let manager = SettingsManager::new(Arc::new(storage.clone()), config());
    let before = storage.snapshot().await;

    let mut export = export_of(json!({"theme": {"mode": "light"}}));
    export
        .settings
        .insert("theme".to_string(), json!({"mode": "dark"}));

    let result = manager.import_settings(export).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("checksum"));
    assert_eq!(storage.snapshot().await, before);
}

#[tokio::test]
async fn test_restore_snapshot_undoes_import() {
    let storage = settings_store().await;
    let manager = SettingsManager::new(Arc::new(storage.clone()), config());

    let result = manager
        .import_settings(export_of(json!({
            "preferences": {"language": "fr"},
            "shortcuts": {"toggle": "Alt+S"}
        })))
        .await;
    assert!(result.success);

    let restored = manager
        .restore_settings_backup(&result.backup_id.unwrap())
        .await
        .unwrap();

    assert_eq!(restored, 2);
    assert_eq!(
        storage.get("preferences").await.unwrap(),
        Some(json!({"language": "en", "wakeWord": "hey"}))
    );
    assert!(storage.get("shortcuts").await.unwrap().is_none());
}

#[tokio::test]
async fn test_reset_category_keeps_snapshot() {
    let storage = settings_store().await;
    let manager = SettingsManager::new(Arc::new(storage.clone()), config());

    let snapshot_id = manager
        .reset_category(SettingsCategory::Privacy)
        .await
        .unwrap();

    assert!(storage.get("privacy").await.unwrap().is_none());
    let snapshots = manager.list_settings_backups().await.unwrap();
    assert_eq!(snapshots[0].id, snapshot_id);
    assert_eq!(
        snapshots[0].settings["privacy"],
        json!({"dataRetentionDays": 30})
    );
}

#[tokio::test]
async fn test_failed_write_restores_snapshot() {
    common::init_tracing();
    let inner = store_at(
        "1.0.0",
        data(json!({"preferences": {"language": "en"}})),
    )
    .await;
    let storage = FailingStorage::new(inner.clone());
    storage.fail_writes_to("theme");
    let manager = SettingsManager::new(Arc::new(storage), config());

    let result = manager
        .import_settings(export_of(json!({
            "preferences": {"language": "de"},
            "theme": {"mode": "dark"}
        })))
        .await;

    assert!(!result.success);
    assert_eq!(result.error_kind.as_deref(), Some("storage"));
    assert_eq!(
        inner.get("preferences").await.unwrap(),
        Some(json!({"language": "en"}))
    );
    assert!(inner.get("theme").await.unwrap().is_none());
}
