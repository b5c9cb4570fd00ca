//! Both storage backends must behave identically for the operations the
//! engine relies on.

use serde_json::json;
use statekeep_core::{DataMap, JsonFileStorage, MemoryStorage, Storage};

fn app_data() -> DataMap {
    match json!({"preferences": {"theme": "dark"}, "shortcuts": {}}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

async fn check_contract(storage: &dyn Storage) {
    assert_eq!(storage.get_version().await.unwrap(), None);
    assert!(storage.load_all_data().await.unwrap().is_empty());

    storage.set("stale", json!(1)).await.unwrap();
    storage.set("backup_0001", json!({"id": "0001"})).await.unwrap();
    storage.set_version("1.2.0").await.unwrap();

    storage.save_all_data(app_data()).await.unwrap();

    assert_eq!(storage.load_all_data().await.unwrap(), app_data());
    assert_eq!(
        storage.get_version().await.unwrap().as_deref(),
        Some("1.2.0")
    );
    assert!(storage.get("backup_0001").await.unwrap().is_some());
    assert!(storage.get("stale").await.unwrap().is_none());

    let mut reserved = DataMap::new();
    reserved.insert("__version".to_string(), json!("9.9.9"));
    let err = storage.save_all_data(reserved).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_input");
    assert_eq!(
        storage.get_version().await.unwrap().as_deref(),
        Some("1.2.0")
    );

    storage.remove("shortcuts").await.unwrap();
    storage.remove("never-existed").await.unwrap();
    let mut keys = storage.keys().await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["__version", "backup_0001", "preferences"]);
}

#[tokio::test]
async fn test_memory_storage_contract() {
    check_contract(&MemoryStorage::new()).await;
}

#[tokio::test]
async fn test_file_storage_contract() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path().join("nested").join("store.json"));
    check_contract(&storage).await;

    let reopened = JsonFileStorage::new(storage.path());
    assert_eq!(
        reopened.get("preferences").await.unwrap(),
        Some(json!({"theme": "dark"}))
    );
}

#[tokio::test]
async fn test_non_string_version_marker_is_a_storage_error() {
    let storage = MemoryStorage::new();
    storage.set("__version", json!(2)).await.unwrap();

    let err = storage.get_version().await.unwrap_err();
    assert_eq!(err.kind(), "storage");
}
