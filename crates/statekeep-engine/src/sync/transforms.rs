//! Structural transformations between storage layouts.
//!
//! A flat layout keeps every logical field at the top level. A partitioned
//! layout nests them under storage-area keys (`local`, `sync`, `managed`).
//! The pipeline between two layouts is chosen from the pair alone and always
//! runs in the planned order.

use serde_json::Value;
use tracing::trace;

use statekeep_core::{DataMap, Error, Result, StorageArea, StorageLayout, ValidationResult, Validator};

use super::environment::EnvironmentProfile;

/// Logical fields placed in the sync area when partitioning.
pub const SYNC_AREA_FIELDS: &[&str] = &[
    "preferences",
    "voiceSettings",
    "shortcuts",
    "theme",
    "customCommands",
    "privacy",
];

/// Logical fields placed in the managed area when partitioning.
pub const MANAGED_AREA_FIELDS: &[&str] = &["managedPolicies"];

/// A named step of the transformation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Flat store into storage areas.
    PartitionStorageAreas,
    /// Storage areas merged into a flat store.
    FlattenStorageAreas,
    /// Storage areas redistributed to the areas the target supports.
    RemapStorageAreas,
}

impl Transform {
    /// Name recorded in export metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Transform::PartitionStorageAreas => "partition_storage_areas",
            Transform::FlattenStorageAreas => "flatten_storage_areas",
            Transform::RemapStorageAreas => "remap_storage_areas",
        }
    }

    pub fn apply(&self, data: DataMap, target: &StorageLayout) -> Result<DataMap> {
        match self {
            Transform::PartitionStorageAreas => partition(data, target.areas()),
            Transform::FlattenStorageAreas => flatten(data),
            Transform::RemapStorageAreas => remap(data, target.areas()),
        }
    }
}

/// Steps that turn data shaped for `from` into data shaped for `to`.
pub fn plan(from: &StorageLayout, to: &StorageLayout) -> Vec<Transform> {
    match (from, to) {
        (StorageLayout::Flat, StorageLayout::Flat) => Vec::new(),
        (StorageLayout::Flat, StorageLayout::Partitioned { .. }) => {
            vec![Transform::PartitionStorageAreas]
        }
        (StorageLayout::Partitioned { .. }, StorageLayout::Flat) => {
            vec![Transform::FlattenStorageAreas]
        }
        (StorageLayout::Partitioned { areas: a }, StorageLayout::Partitioned { areas: b }) => {
            let mut a = a.clone();
            let mut b = b.clone();
            a.sort();
            b.sort();
            if a == b {
                Vec::new()
            } else {
                vec![Transform::RemapStorageAreas]
            }
        }
    }
}

/// Run the planned pipeline. Returns the reshaped data and the names of the
/// steps applied.
pub fn run_pipeline(
    data: DataMap,
    from: &EnvironmentProfile,
    to: &EnvironmentProfile,
) -> Result<(DataMap, Vec<String>)> {
    let mut data = data;
    let mut applied = Vec::new();

    for step in plan(&from.layout, &to.layout) {
        trace!(
            subsystem = "sync",
            component = "transforms",
            op = step.name(),
            from_env = %from.environment,
            to_env = %to.environment,
            "Applying transform"
        );
        data = step.apply(data, &to.layout)?;
        applied.push(step.name().to_string());
    }

    Ok((data, applied))
}

fn area_of(key: &str) -> Option<StorageArea> {
    match key {
        "local" => Some(StorageArea::Local),
        "sync" => Some(StorageArea::Sync),
        "managed" => Some(StorageArea::Managed),
        _ => None,
    }
}

/// Area a logical field lands in, given the areas available.
fn home_area(field: &str, areas: &[StorageArea]) -> StorageArea {
    let preferred = if MANAGED_AREA_FIELDS.contains(&field) {
        StorageArea::Managed
    } else if SYNC_AREA_FIELDS.contains(&field) {
        StorageArea::Sync
    } else {
        StorageArea::Local
    };
    fallback_area(preferred, areas)
}

fn fallback_area(preferred: StorageArea, areas: &[StorageArea]) -> StorageArea {
    if areas.contains(&preferred) {
        preferred
    } else if areas.contains(&StorageArea::Local) || areas.is_empty() {
        StorageArea::Local
    } else {
        areas[0]
    }
}

fn empty_areas(areas: &[StorageArea]) -> DataMap {
    areas
        .iter()
        .map(|area| (area.as_str().to_string(), Value::Object(DataMap::new())))
        .collect()
}

fn insert_into_area(out: &mut DataMap, area: StorageArea, key: String, value: Value) {
    if let Value::Object(bucket) = out
        .entry(area.as_str())
        .or_insert_with(|| Value::Object(DataMap::new()))
    {
        bucket.insert(key, value);
    }
}

fn partition(data: DataMap, areas: &[StorageArea]) -> Result<DataMap> {
    let mut out = empty_areas(areas);
    for (key, value) in data {
        let area = home_area(&key, areas);
        insert_into_area(&mut out, area, key, value);
    }
    Ok(out)
}

/// Merge storage areas into one namespace: keys outside any area first, then
/// `local`, `sync` and `managed`, later areas winning on conflicts.
pub fn flatten(data: DataMap) -> Result<DataMap> {
    let mut out = DataMap::new();
    let mut buckets: Vec<(StorageArea, DataMap)> = Vec::new();

    for (key, value) in data {
        match area_of(&key) {
            Some(area) => match value {
                Value::Object(bucket) => buckets.push((area, bucket)),
                _ => {
                    return Err(Error::Validation(format!(
                        "Storage area '{}' must be an object",
                        key
                    )))
                }
            },
            None => {
                out.insert(key, value);
            }
        }
    }

    buckets.sort_by_key(|(area, _)| *area);
    for (_, bucket) in buckets {
        out.extend(bucket);
    }
    Ok(out)
}

fn remap(data: DataMap, areas: &[StorageArea]) -> Result<DataMap> {
    let mut out = empty_areas(areas);

    for (key, value) in data {
        match area_of(&key) {
            Some(area) => {
                let Value::Object(bucket) = value else {
                    return Err(Error::Validation(format!(
                        "Storage area '{}' must be an object",
                        key
                    )));
                };
                let target = fallback_area(area, areas);
                for (field, field_value) in bucket {
                    insert_into_area(&mut out, target, field, field_value);
                }
            }
            None => {
                let target = home_area(&key, areas);
                insert_into_area(&mut out, target, key, value);
            }
        }
    }
    Ok(out)
}

/// Check that `data` has the shape of `profile`'s layout and that its
/// logical fields satisfy the profile schema.
pub fn validate_layout(data: &DataMap, profile: &EnvironmentProfile) -> ValidationResult {
    let mut result = ValidationResult::valid();

    let logical = match &profile.layout {
        StorageLayout::Flat => data.clone(),
        StorageLayout::Partitioned { areas } => {
            for (key, value) in data {
                match area_of(key) {
                    Some(area) if areas.contains(&area) => {
                        if !value.is_object() {
                            result.add_error(format!("Storage area '{}' must be an object", key));
                        }
                    }
                    Some(area) => result.add_error(format!(
                        "Storage area '{}' is not supported by {}",
                        area, profile.environment
                    )),
                    None => result.add_error(format!(
                        "Unexpected top-level key '{}' for the partitioned {} layout",
                        key, profile.environment
                    )),
                }
            }
            if !result.is_valid {
                return result;
            }
            match flatten(data.clone()) {
                Ok(flat) => flat,
                Err(e) => {
                    result.add_error(e.to_string());
                    return result;
                }
            }
        }
    };

    result.merge(Validator::validate(&Value::Object(logical), &profile.schema));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use statekeep_core::Environment;

    fn flat_data() -> DataMap {
        let value = json!({
            "preferences": {"theme": "dark"},
            "customCommands": [],
            "managedPolicies": {"locked": true},
            "cache": {"hits": 3}
        });
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_plan() {
        let chrome = EnvironmentProfile::default_for(Environment::Chrome).layout;
        let edge = EnvironmentProfile::default_for(Environment::Edge).layout;
        let firefox = EnvironmentProfile::default_for(Environment::Firefox).layout;
        let safari = EnvironmentProfile::default_for(Environment::Safari).layout;

        assert!(plan(&chrome, &edge).is_empty());
        assert_eq!(plan(&chrome, &firefox), vec![Transform::RemapStorageAreas]);
        assert_eq!(plan(&safari, &firefox), vec![Transform::PartitionStorageAreas]);
        assert_eq!(plan(&firefox, &safari), vec![Transform::FlattenStorageAreas]);
        assert!(plan(&safari, &safari).is_empty());
    }

    #[test]
    fn test_partition_places_fields() {
        let chrome = EnvironmentProfile::default_for(Environment::Chrome);
        let out = partition(flat_data(), chrome.layout.areas()).unwrap();

        assert_eq!(out["sync"]["preferences"], json!({"theme": "dark"}));
        assert_eq!(out["sync"]["customCommands"], json!([]));
        assert_eq!(out["managed"]["managedPolicies"], json!({"locked": true}));
        assert_eq!(out["local"]["cache"], json!({"hits": 3}));
    }

    #[test]
    fn test_partition_without_managed_area_uses_local() {
        let out = partition(flat_data(), &[StorageArea::Local, StorageArea::Sync]).unwrap();
        assert_eq!(out["local"]["managedPolicies"], json!({"locked": true}));
        assert!(out.get("managed").is_none());
    }

    #[test]
    fn test_flatten_inverts_partition() {
        let chrome = EnvironmentProfile::default_for(Environment::Chrome);
        let partitioned = partition(flat_data(), chrome.layout.areas()).unwrap();
        assert_eq!(flatten(partitioned).unwrap(), flat_data());
    }

    #[test]
    fn test_flatten_rejects_non_object_area() {
        let data = json!({"local": 3}).as_object().cloned().unwrap();
        assert!(flatten(data).is_err());
    }

    #[test]
    fn test_remap_moves_unsupported_area_to_local() {
        let data = json!({
            "local": {"cache": 1},
            "sync": {"preferences": {}},
            "managed": {"managedPolicies": {}}
        })
        .as_object()
        .cloned()
        .unwrap();

        let out = remap(data, &[StorageArea::Local, StorageArea::Sync]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out["local"]["managedPolicies"], json!({}));
        assert_eq!(out["sync"]["preferences"], json!({}));
    }

    #[test]
    fn test_validate_layout() {
        let chrome = EnvironmentProfile::default_for(Environment::Chrome);
        let partitioned = partition(flat_data(), chrome.layout.areas()).unwrap();
        assert!(validate_layout(&partitioned, &chrome).is_valid);

        let result = validate_layout(&flat_data(), &chrome);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("Unexpected top-level key"));

        let safari = EnvironmentProfile::default_for(Environment::Safari);
        let missing = json!({"cache": 1}).as_object().cloned().unwrap();
        let result = validate_layout(&missing, &safari);
        assert!(result
            .errors
            .contains(&"Missing required field: preferences".to_string()));
    }
}
