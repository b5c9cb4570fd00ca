//! Per-version field-validation schemas and the registry that supplies them.
//!
//! Schemas are configuration, not code: a registry maps a version string to
//! a set of field rules. `StaticSchemaRegistry` can be assembled in code or
//! loaded from JSON such as:
//!
//! ```json
//! {
//!   "1.0.0": {
//!     "preferences": { "type": "object", "required": true },
//!     "preferences.theme": { "type": "string", "enum": ["light", "dark", "auto"] }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{Error, Result};
use crate::version::is_valid_version;

/// JSON type a field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    /// Whether a JSON value has this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }
}

/// Validation rule for a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl FieldRule {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            allowed: None,
            min: None,
            max: None,
            pattern: None,
        }
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restrict the field to a fixed set of values.
    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Inclusive numeric range. For strings and arrays the bounds apply to
    /// the length.
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Regular expression a string value must match.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

/// Field rules for one data version, keyed by (possibly dotted) field path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, FieldRule>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn field(mut self, path: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.insert(path.into(), rule);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, rule: FieldRule) {
        self.fields.insert(path.into(), rule);
    }

    pub fn get(&self, path: &str) -> Option<&FieldRule> {
        self.fields.get(path)
    }

    /// Whether the schema declares a field at `path`.
    pub fn declares(&self, path: &str) -> bool {
        self.fields.contains_key(path)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldRule)> {
        self.fields.iter()
    }

    /// Paths of all required fields, in sorted order.
    pub fn required_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, rule)| rule.required)
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Top-level names declared by this schema (first segment of each path).
    pub fn top_level_fields(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .fields
            .keys()
            .map(|path| path.split('.').next().unwrap_or(path.as_str()))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Supplies the schema for a data version.
///
/// Injected into the engine so schemas can come from a static table,
/// embedded configuration or a file loader.
pub trait SchemaRegistry: Send + Sync {
    /// Schema for `version`, or `None` when the version is unknown.
    fn get_schema(&self, version: &str) -> Option<Schema>;

    /// Versions this registry knows about.
    fn versions(&self) -> Vec<String>;

    fn has_schema(&self, version: &str) -> bool {
        self.get_schema(version).is_some()
    }
}

/// In-memory schema table.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl StaticSchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the schema for a version.
    pub fn insert(&mut self, version: &str, schema: Schema) -> Result<()> {
        if !is_valid_version(version) {
            return Err(Error::InvalidInput(format!(
                "Invalid schema version: {}",
                version
            )));
        }
        self.schemas.insert(version.to_string(), schema);
        Ok(())
    }

    /// Builder-style registration.
    pub fn with_schema(mut self, version: &str, schema: Schema) -> Result<Self> {
        self.insert(version, schema)?;
        Ok(self)
    }

    /// Load a `{version: {field: rule}}` table from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let table: BTreeMap<String, Schema> = serde_json::from_str(json)
            .map_err(|e| Error::Serialization(format!("Failed to parse schema table: {}", e)))?;

        let mut registry = Self::new();
        for (version, schema) in table {
            registry.insert(&version, schema)?;
        }
        Ok(registry)
    }

    /// Load a schema table from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Storage(format!(
                "Failed to read schema table from {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }
}

impl SchemaRegistry for StaticSchemaRegistry {
    fn get_schema(&self, version: &str) -> Option<Schema> {
        self.schemas.get(version).cloned()
    }

    fn versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.schemas.keys().cloned().collect();
        versions.sort();
        versions
    }
}
