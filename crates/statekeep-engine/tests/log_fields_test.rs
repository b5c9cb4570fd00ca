//! The field names in `statekeep_core::logging` are the ones the engine
//! actually emits.

mod common;

use std::io;
use std::sync::{Arc, Mutex};

use serde_json::json;
use statekeep_core::{logging, Environment};
use statekeep_engine::{BackupManager, MigrationManager, SyncManager};

use common::{config, data, migration_registry, schema_registry, seed_data, store_at};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    fn has_field(&self, name: &str) -> bool {
        self.text().contains(&format!(" {}=", name))
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture() -> (Captured, tracing::subscriber::DefaultGuard) {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .without_time()
        .with_writer(move || writer.clone())
        .finish();
    (captured, tracing::subscriber::set_default(subscriber))
}

#[tokio::test]
async fn test_migration_fields() {
    let (logs, _guard) = capture();
    let manager = MigrationManager::new(
        Arc::new(store_at("1.0.0", seed_data()).await),
        Arc::new(schema_registry()),
        Arc::new(migration_registry()),
        config(),
    );

    let result = manager.migrate("1.0.0", "1.1.0").await;
    assert!(result.success, "migration failed: {:?}", result.error);

    for field in [
        logging::SUBSYSTEM,
        logging::COMPONENT,
        logging::OPERATION,
        logging::MIGRATION_KEY,
        logging::FROM_VERSION,
        logging::TO_VERSION,
        logging::BACKUP_ID,
        logging::INCLUDE_SENSITIVE_DATA,
        logging::STEP_COUNT,
        logging::DURATION_MS,
    ] {
        assert!(logs.has_field(field), "missing {} in:\n{}", field, logs.text());
    }
    assert!(logs.text().contains("migration_key=1.0.0-to-1.1.0"));
}

#[tokio::test]
async fn test_sync_fields() {
    let (logs, _guard) = capture();
    let chrome = store_at(
        "1.0.0",
        data(json!({"sync": {"preferences": {"theme": "dark"}}})),
    )
    .await;
    let firefox = store_at(
        "1.0.0",
        data(json!({"sync": {"preferences": {"theme": "light"}}})),
    )
    .await;
    let manager = SyncManager::new(Arc::new(schema_registry()), config())
        .with_store(Environment::Chrome, Arc::new(chrome))
        .with_store(Environment::Firefox, Arc::new(firefox));

    let result = manager
        .sync_data(Environment::Chrome, Environment::Firefox)
        .await;
    assert!(result.success, "sync failed: {:?}", result.error);

    for field in [
        logging::FROM_ENV,
        logging::TO_ENV,
        logging::ENVIRONMENT,
        logging::ITEM_COUNT,
    ] {
        assert!(logs.has_field(field), "missing {} in:\n{}", field, logs.text());
    }
}

#[tokio::test]
async fn test_backup_import_rename_fields() {
    let (logs, _guard) = capture();
    let manager = BackupManager::new(
        Arc::new(store_at("1.0.0", seed_data()).await),
        Arc::new(schema_registry()),
        config(),
    );
    let backup = manager.create_backup(true).await.unwrap();
    let export = manager.export_backup(&backup.id).await.unwrap();

    let result = manager.import_backup(export).await;
    assert!(result.success, "import failed: {:?}", result.error);

    for field in [logging::NEW_BACKUP_ID, logging::SAFETY_BACKUP_ID] {
        assert!(logs.has_field(field), "missing {} in:\n{}", field, logs.text());
    }
}
