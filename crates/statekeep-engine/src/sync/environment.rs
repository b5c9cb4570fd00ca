//! Per-environment storage profiles and the sync compatibility matrix.

use serde::{Deserialize, Serialize};

use statekeep_core::{Environment, FieldRule, FieldType, Schema, StorageArea, StorageLayout};

/// How one environment stores data and which logical fields it declares.
///
/// `schema` describes the data after flattening any storage areas, so the
/// same logical field set can be compared across layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    pub environment: Environment,
    pub layout: StorageLayout,
    pub schema: Schema,
}

impl EnvironmentProfile {
    pub fn new(environment: Environment, layout: StorageLayout, schema: Schema) -> Self {
        Self {
            environment,
            layout,
            schema,
        }
    }

    /// Built-in profile for an environment.
    pub fn default_for(environment: Environment) -> Self {
        let layout = match environment {
            Environment::Chrome | Environment::Edge => StorageLayout::Partitioned {
                areas: vec![StorageArea::Local, StorageArea::Sync, StorageArea::Managed],
            },
            Environment::Firefox => StorageLayout::Partitioned {
                areas: vec![StorageArea::Local, StorageArea::Sync],
            },
            Environment::Safari => StorageLayout::Flat,
        };

        let mut schema = Schema::new()
            .field("preferences", FieldRule::new(FieldType::Object).required())
            .field("voiceSettings", FieldRule::new(FieldType::Object))
            .field("customCommands", FieldRule::new(FieldType::Array))
            .field("shortcuts", FieldRule::new(FieldType::Object))
            .field("privacy", FieldRule::new(FieldType::Object))
            .field("theme", FieldRule::new(FieldType::Object))
            .field("analytics", FieldRule::new(FieldType::Object));
        if layout.has_area(StorageArea::Managed) {
            schema.insert("managedPolicies", FieldRule::new(FieldType::Object));
        }

        Self::new(environment, layout, schema)
    }
}

/// Environments `from` may sync into.
pub fn sync_targets(from: Environment) -> &'static [Environment] {
    match from {
        Environment::Chrome => &[Environment::Edge, Environment::Firefox],
        Environment::Edge => &[Environment::Chrome, Environment::Firefox],
        Environment::Firefox => &[Environment::Chrome, Environment::Edge, Environment::Safari],
        Environment::Safari => &[Environment::Firefox],
    }
}

pub fn can_sync(from: Environment, to: Environment) -> bool {
    sync_targets(from).contains(&to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix() {
        assert!(can_sync(Environment::Chrome, Environment::Edge));
        assert!(can_sync(Environment::Safari, Environment::Firefox));
        assert!(!can_sync(Environment::Chrome, Environment::Safari));
        for env in Environment::ALL {
            assert!(!can_sync(env, env));
        }
    }

    #[test]
    fn test_default_profiles() {
        let chrome = EnvironmentProfile::default_for(Environment::Chrome);
        assert!(chrome.layout.has_area(StorageArea::Managed));
        assert!(chrome.schema.declares("managedPolicies"));

        let firefox = EnvironmentProfile::default_for(Environment::Firefox);
        assert_eq!(firefox.layout.areas(), &[StorageArea::Local, StorageArea::Sync]);
        assert!(!firefox.schema.declares("managedPolicies"));

        let safari = EnvironmentProfile::default_for(Environment::Safari);
        assert!(safari.layout.is_flat());
        assert_eq!(safari.schema.required_fields(), vec!["preferences"]);
    }
}
