//! Engine configuration.

use statekeep_core::defaults::{
    DEFAULT_DATA_VERSION, HISTORY_LIMIT, LOCALE, MAX_BACKUPS, MAX_SETTINGS_BACKUPS, TIMEZONE,
    USER_AGENT,
};
use statekeep_core::{is_valid_version, Environment};

/// Settings shared by the backup, migration, sync and settings managers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Backups kept before the oldest are pruned.
    pub max_backups: usize,
    /// Migration history entries kept, newest first.
    pub history_limit: usize,
    /// Settings snapshots kept before the oldest are pruned.
    pub max_settings_backups: usize,
    /// Environment stamped on backups and exports.
    pub environment: Environment,
    /// Application version recorded in metadata.
    pub extension_version: String,
    /// Version assumed when a store has no version marker.
    pub default_version: String,
    pub user_agent: String,
    pub platform: String,
    pub locale: String,
    pub timezone: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_backups: MAX_BACKUPS,
            history_limit: HISTORY_LIMIT,
            max_settings_backups: MAX_SETTINGS_BACKUPS,
            environment: Environment::Chrome,
            extension_version: env!("CARGO_PKG_VERSION").to_string(),
            default_version: DEFAULT_DATA_VERSION.to_string(),
            user_agent: USER_AGENT.to_string(),
            platform: std::env::consts::OS.to_string(),
            locale: LOCALE.to_string(),
            timezone: TIMEZONE.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `STATEKEEP_MAX_BACKUPS` | `10` | Backup retention cap |
    /// | `STATEKEEP_HISTORY_LIMIT` | `100` | Migration history cap |
    /// | `STATEKEEP_SETTINGS_BACKUPS` | `5` | Settings snapshot retention cap |
    /// | `STATEKEEP_ENVIRONMENT` | `chrome` | Environment stamped on backups/exports |
    /// | `STATEKEEP_EXTENSION_VERSION` | crate version | Recorded in metadata |
    /// | `STATEKEEP_DEFAULT_VERSION` | `1.0.0` | Version of a store without marker |
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_backups = std::env::var("STATEKEEP_MAX_BACKUPS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.max_backups)
            .max(1);

        let history_limit = std::env::var("STATEKEEP_HISTORY_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.history_limit)
            .max(1);

        let max_settings_backups = std::env::var("STATEKEEP_SETTINGS_BACKUPS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.max_settings_backups)
            .max(1);

        let environment = std::env::var("STATEKEEP_ENVIRONMENT")
            .ok()
            .and_then(|v| v.parse::<Environment>().ok())
            .unwrap_or(defaults.environment);

        let extension_version = std::env::var("STATEKEEP_EXTENSION_VERSION")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.extension_version);

        let default_version = std::env::var("STATEKEEP_DEFAULT_VERSION")
            .ok()
            .filter(|v| is_valid_version(v))
            .unwrap_or(defaults.default_version);

        Self {
            max_backups,
            history_limit,
            max_settings_backups,
            environment,
            extension_version,
            default_version,
            ..defaults
        }
    }

    pub fn with_max_backups(mut self, max: usize) -> Self {
        self.max_backups = max.max(1);
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn with_max_settings_backups(mut self, max: usize) -> Self {
        self.max_settings_backups = max.max(1);
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_extension_version(mut self, version: impl Into<String>) -> Self {
        self.extension_version = version.into();
        self
    }

    /// Set the version assumed for unversioned stores. Invalid versions are
    /// ignored.
    pub fn with_default_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        if is_valid_version(&version) {
            self.default_version = version;
        }
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }
}
