//! Validation of in-memory data against a version schema.
//!
//! Errors are hard failures (the data must not be committed); warnings are
//! informational and never block an operation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::schema::{FieldRule, FieldType, Schema};

/// Outcome of a validation call. Produced fresh per call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::valid()
    }
}

impl ValidationResult {
    /// A passing result with no findings.
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A failing result with a single error.
    pub fn invalid(error: impl Into<String>) -> Self {
        let mut result = Self::valid();
        result.add_error(error);
        result
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.is_valid = false;
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Fold another result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.is_valid &= other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Convert a failing result into `Error::Validation` prefixed with
    /// `context`.
    pub fn into_result(self, context: &str) -> Result<Vec<String>> {
        if self.is_valid {
            Ok(self.warnings)
        } else {
            Err(Error::Validation(format!(
                "{}: {}",
                context,
                self.errors.join("; ")
            )))
        }
    }
}

/// Field-by-field schema validator.
pub struct Validator;

impl Validator {
    /// Validate `data` (a JSON object) against `schema`.
    ///
    /// Dotted schema paths address nested objects. Fields present in the
    /// data but undeclared at the top level of the schema produce warnings.
    pub fn validate(data: &Value, schema: &Schema) -> ValidationResult {
        let mut result = ValidationResult::valid();

        let Some(object) = data.as_object() else {
            result.add_error("Data must be a JSON object");
            return result;
        };

        for (path, rule) in schema.fields() {
            match lookup(data, path) {
                None | Some(Value::Null) => {
                    if rule.required {
                        result.add_error(format!("Missing required field: {}", path));
                    }
                }
                Some(value) => check_field(path, value, rule, &mut result),
            }
        }

        if !schema.is_empty() {
            let declared = schema.top_level_fields();
            for key in object.keys() {
                if !declared.contains(&key.as_str()) {
                    result.add_warning(format!("Unknown field '{}' is not declared in schema", key));
                }
            }
        }

        result
    }
}

/// Resolve a dotted path inside nested objects.
pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(data, |current, segment| current.as_object()?.get(segment))
}

fn check_field(path: &str, value: &Value, rule: &FieldRule, result: &mut ValidationResult) {
    if !rule.field_type.matches(value) {
        result.add_error(format!(
            "Field '{}' expected type {}, found {}",
            path,
            rule.field_type.as_str(),
            json_type_name(value)
        ));
        return;
    }

    if let Some(allowed) = &rule.allowed {
        if !allowed.contains(value) {
            let options: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
            result.add_error(format!(
                "Field '{}' has value {} which is not one of [{}]",
                path,
                value,
                options.join(", ")
            ));
        }
    }

    let (measure, unit) = match rule.field_type {
        FieldType::Number | FieldType::Integer => (value.as_f64(), "value"),
        FieldType::String => (value.as_str().map(|s| s.chars().count() as f64), "length"),
        FieldType::Array => (value.as_array().map(|a| a.len() as f64), "length"),
        FieldType::Boolean | FieldType::Object => (None, "value"),
    };

    if let Some(measure) = measure {
        if let Some(min) = rule.min {
            if measure < min {
                result.add_error(format!(
                    "Field '{}' {} {} is below minimum {}",
                    path, unit, measure, min
                ));
            }
        }
        if let Some(max) = rule.max {
            if measure > max {
                result.add_error(format!(
                    "Field '{}' {} {} exceeds maximum {}",
                    path, unit, measure, max
                ));
            }
        }
    }

    if let (Some(pattern), Some(text)) = (&rule.pattern, value.as_str()) {
        match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(text) {
                    result.add_error(format!(
                        "Field '{}' value '{}' does not match pattern {}",
                        path, text, pattern
                    ));
                }
            }
            Err(e) => {
                result.add_error(format!("Field '{}' has invalid pattern {}: {}", path, pattern, e));
            }
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
