//! User-settings categories and their validators.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use statekeep_core::{Error, FieldRule, FieldType, Schema, ValidationResult, Validator};

static COLOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-F]{6}$").expect("color pattern is valid"));

/// A named group of user settings, stored under its own top-level key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingsCategory {
    Preferences,
    VoiceSettings,
    Privacy,
    Theme,
    CustomCommands,
    Shortcuts,
    Analytics,
}

impl SettingsCategory {
    pub const ALL: [SettingsCategory; 7] = [
        SettingsCategory::Preferences,
        SettingsCategory::VoiceSettings,
        SettingsCategory::Privacy,
        SettingsCategory::Theme,
        SettingsCategory::CustomCommands,
        SettingsCategory::Shortcuts,
        SettingsCategory::Analytics,
    ];

    /// Storage key of the category.
    pub fn key(&self) -> &'static str {
        match self {
            SettingsCategory::Preferences => "preferences",
            SettingsCategory::VoiceSettings => "voiceSettings",
            SettingsCategory::Privacy => "privacy",
            SettingsCategory::Theme => "theme",
            SettingsCategory::CustomCommands => "customCommands",
            SettingsCategory::Shortcuts => "shortcuts",
            SettingsCategory::Analytics => "analytics",
        }
    }

    /// Check a category value. Only errors are reported; fields the
    /// validator does not know about are accepted silently.
    pub fn validate(&self, value: &Value) -> ValidationResult {
        let result = match self {
            SettingsCategory::CustomCommands => validate_custom_commands(value),
            SettingsCategory::Shortcuts => validate_shortcuts(value),
            SettingsCategory::Theme => validate_theme(value),
            other => validate_object(value, &other.schema()),
        };
        prefix_errors(self.key(), result)
    }

    fn schema(&self) -> Schema {
        match self {
            SettingsCategory::Preferences => Schema::new()
                .field(
                    "theme",
                    FieldRule::new(FieldType::String).one_of(["light", "dark", "auto"]),
                )
                .field("language", FieldRule::new(FieldType::String).min(1.0))
                .field("wakeWord", FieldRule::new(FieldType::String).min(1.0)),
            SettingsCategory::VoiceSettings => Schema::new()
                .field("sensitivity", FieldRule::new(FieldType::Number).range(0.0, 1.0))
                .field("volume", FieldRule::new(FieldType::Number).range(0.0, 1.0))
                .field("language", FieldRule::new(FieldType::String).min(1.0)),
            SettingsCategory::Privacy => Schema::new()
                .field(
                    "dataRetentionDays",
                    FieldRule::new(FieldType::Integer).range(1.0, 365.0),
                )
                .field("collectAnalytics", FieldRule::new(FieldType::Boolean)),
            SettingsCategory::Theme => Schema::new().field(
                "mode",
                FieldRule::new(FieldType::String).one_of(["light", "dark", "auto"]),
            ),
            SettingsCategory::Analytics => Schema::new()
                .field("enabled", FieldRule::new(FieldType::Boolean))
                .field("sampleRate", FieldRule::new(FieldType::Number).range(0.0, 1.0)),
            SettingsCategory::CustomCommands | SettingsCategory::Shortcuts => Schema::new(),
        }
    }
}

impl fmt::Display for SettingsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SettingsCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingsCategory::ALL
            .into_iter()
            .find(|category| category.key() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown settings category: {}", s)))
    }
}

fn validate_object(value: &Value, schema: &Schema) -> ValidationResult {
    if !value.is_object() {
        return ValidationResult::invalid("must be an object");
    }
    let mut result = Validator::validate(value, schema);
    result.warnings.clear();
    result
}

fn validate_theme(value: &Value) -> ValidationResult {
    let mut result = validate_object(value, &SettingsCategory::Theme.schema());
    let Some(theme) = value.as_object() else {
        return result;
    };

    for (key, color) in theme.iter().filter(|(key, _)| key.ends_with("Color")) {
        match color.as_str() {
            Some(text) if COLOR_PATTERN.is_match(text) => {}
            _ => result.add_error(format!(
                "Field '{}' must be a color like #1A2B3C, found {}",
                key, color
            )),
        }
    }
    result
}

fn validate_custom_commands(value: &Value) -> ValidationResult {
    let Some(commands) = value.as_array() else {
        return ValidationResult::invalid("must be an array");
    };

    let mut result = ValidationResult::valid();
    let mut triggers = HashSet::new();

    for (index, command) in commands.iter().enumerate() {
        let Some(command) = command.as_object() else {
            result.add_error(format!("Command {} must be an object", index));
            continue;
        };

        for field in ["trigger", "action"] {
            let present = command
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| !s.trim().is_empty());
            if !present {
                result.add_error(format!("Command {} is missing '{}'", index, field));
            }
        }

        if let Some(trigger) = command.get("trigger").and_then(Value::as_str) {
            let normalized = trigger.trim().to_lowercase();
            if !normalized.is_empty() && !triggers.insert(normalized) {
                result.add_error(format!("Duplicate command trigger '{}'", trigger));
            }
        }
    }
    result
}

fn validate_shortcuts(value: &Value) -> ValidationResult {
    let Some(shortcuts) = value.as_object() else {
        return ValidationResult::invalid("must be an object");
    };

    let mut result = ValidationResult::valid();
    for (action, binding) in shortcuts {
        let valid = binding.as_str().is_some_and(|s| !s.trim().is_empty());
        if !valid {
            result.add_error(format!(
                "Shortcut '{}' must be a non-empty key binding",
                action
            ));
        }
    }
    result
}

fn prefix_errors(category: &str, result: ValidationResult) -> ValidationResult {
    let mut prefixed = ValidationResult::valid();
    for error in result.errors {
        prefixed.add_error(format!("{}: {}", category, error));
    }
    for warning in result.warnings {
        prefixed.add_warning(format!("{}: {}", category, warning));
    }
    prefixed
}
