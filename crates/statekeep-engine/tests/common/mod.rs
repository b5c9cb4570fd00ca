//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use statekeep_core::{
    DataMap, Error, FieldRule, FieldType, MemoryStorage, Result, Schema, StaticSchemaRegistry,
    Storage,
};
use statekeep_engine::{EngineConfig, FnMigration, MigrationRegistry};

/// Route engine logs to the test output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a data map from a JSON object literal.
pub fn data(value: Value) -> DataMap {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture must be a JSON object, got {}", other),
    }
}

/// Typical application data for a 1.x store.
pub fn seed_data() -> DataMap {
    data(json!({
        "preferences": {"theme": "dark", "language": "en"},
        "shortcuts": {"toggle": "Ctrl+Shift+V"}
    }))
}

fn base_schema() -> Schema {
    Schema::new()
        .field("preferences", FieldRule::new(FieldType::Object).required())
        .field("shortcuts", FieldRule::new(FieldType::Object))
}

/// Schemas for 1.0.0, 1.1.0, 1.2.0 and 2.0.0.
///
/// 1.1.0 adds `voiceSettings`, 1.2.0 adds `customCommands` and 2.0.0
/// requires an integer `settingsVersion`.
pub fn schema_registry() -> StaticSchemaRegistry {
    let v1_0 = base_schema();
    let v1_1 = base_schema().field("voiceSettings", FieldRule::new(FieldType::Object));
    let v1_2 = v1_1
        .clone()
        .field("customCommands", FieldRule::new(FieldType::Array));
    let v2_0 = v1_2
        .clone()
        .field("settingsVersion", FieldRule::new(FieldType::Integer).required());

    StaticSchemaRegistry::new()
        .with_schema("1.0.0", v1_0)
        .and_then(|r| r.with_schema("1.1.0", v1_1))
        .and_then(|r| r.with_schema("1.2.0", v1_2))
        .and_then(|r| r.with_schema("2.0.0", v2_0))
        .expect("fixture schemas are valid")
}

fn add_key(key: &'static str, value: Value) -> impl Fn(DataMap) -> Result<DataMap> {
    move |mut data| {
        data.entry(key).or_insert_with(|| value.clone());
        Ok(data)
    }
}

fn remove_key(key: &'static str) -> impl Fn(DataMap) -> Result<DataMap> {
    move |mut data| {
        data.remove(key);
        Ok(data)
    }
}

/// Linear chain 1.0.0 -> 1.1.0 -> 1.2.0 -> 2.0.0 whose rollbacks undo
/// exactly what the forward steps add.
pub fn migration_registry() -> MigrationRegistry {
    MigrationRegistry::new()
        .with_migration(FnMigration::new(
            "1.0.0",
            "1.1.0",
            "Add voice settings",
            add_key("voiceSettings", json!({"sensitivity": 0.5})),
            remove_key("voiceSettings"),
        ))
        .and_then(|r| {
            r.with_migration(FnMigration::new(
                "1.1.0",
                "1.2.0",
                "Add custom commands",
                add_key("customCommands", json!([])),
                remove_key("customCommands"),
            ))
        })
        .and_then(|r| {
            r.with_migration(FnMigration::new(
                "1.2.0",
                "2.0.0",
                "Stamp settings version",
                add_key("settingsVersion", json!(2)),
                remove_key("settingsVersion"),
            ))
        })
        .expect("fixture migrations are valid")
}

/// Config with retention caps large enough not to interfere.
pub fn config() -> EngineConfig {
    EngineConfig::default()
        .with_max_backups(50)
        .with_max_settings_backups(50)
}

/// Memory store holding `data` at `version`.
pub async fn store_at(version: &str, data: DataMap) -> MemoryStorage {
    let storage = MemoryStorage::with_data(data);
    storage
        .set_version(version)
        .await
        .expect("memory store accepts version marker");
    storage
}

/// Application data currently in a store, reserved keys excluded.
pub async fn live_data(storage: &dyn Storage) -> DataMap {
    storage.load_all_data().await.expect("memory store loads")
}

/// Memory store with injectable write failures.
///
/// A failing `save_all_data` writes a stray key before erroring, leaving the
/// store half-written the way an interrupted bulk write would.
#[derive(Debug, Clone, Default)]
pub struct FailingStorage {
    inner: MemoryStorage,
    failing_saves: Arc<AtomicUsize>,
    failing_key: Arc<Mutex<Option<String>>>,
}

impl FailingStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Make every `set` of `key` fail.
    pub fn fail_writes_to(&self, key: &str) {
        *self.failing_key.lock().unwrap() = Some(key.to_string());
    }

    /// Make the next `count` bulk saves fail.
    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }

    fn take_failure(&self) -> bool {
        self.failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let fail = self.failing_key.lock().unwrap().as_deref() == Some(key);
        if fail {
            return Err(Error::Storage(format!("injected write failure for {}", key)));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys().await
    }

    async fn save_all_data(&self, data: DataMap) -> Result<()> {
        if self.take_failure() {
            self.inner.set("partialWrite", json!(true)).await?;
            return Err(Error::Storage("injected bulk write failure".to_string()));
        }
        self.inner.save_all_data(data).await
    }
}
