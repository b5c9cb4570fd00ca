//! Schema gate applied before any data is committed.

use serde_json::Value;

use statekeep_core::{DataMap, Result, SchemaRegistry, ValidationResult, Validator};

/// Validate `data` against the schema registered for `version`.
///
/// An unknown version is a validation failure: data is never committed
/// under a version nothing can describe.
pub fn validate_for_version(
    schemas: &dyn SchemaRegistry,
    data: &DataMap,
    version: &str,
) -> ValidationResult {
    match schemas.get_schema(version) {
        Some(schema) => Validator::validate(&Value::Object(data.clone()), &schema),
        None => ValidationResult::invalid(format!("No schema registered for version {}", version)),
    }
}

/// Like [`validate_for_version`], but a failure becomes `Error::Validation`.
/// Warnings are returned on success.
pub(crate) fn require_valid(
    schemas: &dyn SchemaRegistry,
    data: &DataMap,
    version: &str,
) -> Result<Vec<String>> {
    validate_for_version(schemas, data, version)
        .into_result(&format!("Data is not valid for version {}", version))
}
