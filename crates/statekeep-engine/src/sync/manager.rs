//! Export, transform and import of data between environment stores.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use statekeep_core::{
    check_major_compatibility, checksum_json, is_valid_version, now_millis, Environment, Error,
    ExportMetadata, ExportedData, Result, SchemaRegistry, Storage,
};

use super::environment::{can_sync, EnvironmentProfile};
use super::transforms::{run_pipeline, validate_layout};
use crate::backup::BackupManager;
use crate::commit::{commit_data, version_or_default};
use crate::config::EngineConfig;

/// Whether data may move from one environment to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResult {
    pub compatible: bool,
    pub from: Environment,
    pub to: Environment,
    /// Why the pair is incompatible; empty when compatible.
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
}

/// Outcome of [`SyncManager::import_data`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub environment: Environment,
    pub items_imported: usize,
    /// Backup of the target store taken before the write.
    pub backup_id: Option<String>,
    pub transformations: Vec<String>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}

/// Outcome of [`SyncManager::sync_data`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub from: Environment,
    pub to: Environment,
    pub items_synced: usize,
    pub backup_id: Option<String>,
    pub transformations: Vec<String>,
    pub compatibility: CompatibilityResult,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}

struct Imported {
    items: usize,
    backup_id: String,
    transformations: Vec<String>,
    warnings: Vec<String>,
}

/// Moves data between per-environment stores.
///
/// Every failure before the final write leaves the target store untouched;
/// a failed write restores the backup taken just before it.
#[derive(Clone)]
pub struct SyncManager {
    stores: HashMap<Environment, Arc<dyn Storage>>,
    profiles: HashMap<Environment, EnvironmentProfile>,
    schemas: Arc<dyn SchemaRegistry>,
    config: EngineConfig,
}

impl SyncManager {
    /// Manager with the built-in profiles and no stores.
    pub fn new(schemas: Arc<dyn SchemaRegistry>, config: EngineConfig) -> Self {
        let profiles = Environment::ALL
            .into_iter()
            .map(|env| (env, EnvironmentProfile::default_for(env)))
            .collect();
        Self {
            stores: HashMap::new(),
            profiles,
            schemas,
            config,
        }
    }

    /// Attach the store that holds an environment's data.
    pub fn with_store(mut self, environment: Environment, storage: Arc<dyn Storage>) -> Self {
        self.stores.insert(environment, storage);
        self
    }

    /// Replace the profile of `profile.environment`.
    pub fn with_profile(mut self, profile: EnvironmentProfile) -> Self {
        self.profiles.insert(profile.environment, profile);
        self
    }

    pub fn profile(&self, environment: Environment) -> &EnvironmentProfile {
        // Every environment gets a profile in `new`.
        &self.profiles[&environment]
    }

    fn store(&self, environment: Environment) -> Result<&Arc<dyn Storage>> {
        self.stores
            .get(&environment)
            .ok_or_else(|| Error::NotFound(format!("No store registered for environment {}", environment)))
    }

    /// Backup manager for an environment's store.
    pub fn backups_for(&self, environment: Environment) -> Result<BackupManager> {
        let storage = self.store(environment)?.clone();
        Ok(BackupManager::new(
            storage,
            self.schemas.clone(),
            self.config.clone().with_environment(environment),
        ))
    }

    /// Export all data of an environment's store.
    pub async fn export_data(&self, environment: Environment) -> Result<ExportedData> {
        let storage = self.store(environment)?;
        let data = storage.load_all_data().await?;
        let version = version_or_default(storage.as_ref(), &self.config.default_version).await?;
        let checksum = checksum_json(&data)?;

        let metadata = ExportMetadata {
            user_agent: self.config.user_agent.clone(),
            extension_version: self.config.extension_version.clone(),
            platform: self.config.platform.clone(),
            locale: self.config.locale.clone(),
            timezone: self.config.timezone.clone(),
            compression: "identity".to_string(),
            item_count: data.len(),
            source_environment: None,
            transformations: Vec::new(),
        };

        debug!(
            subsystem = "sync",
            component = "manager",
            op = "export",
            environment = %environment,
            version = %version,
            item_count = data.len(),
            "Data exported"
        );

        Ok(ExportedData {
            version,
            environment,
            timestamp: now_millis(),
            data,
            metadata,
            checksum,
        })
    }

    /// Check the compatibility matrix and that every field the source
    /// requires is declared by the target.
    pub fn validate_sync_compatibility(&self, from: Environment, to: Environment) -> CompatibilityResult {
        let mut result = CompatibilityResult {
            compatible: true,
            from,
            to,
            reasons: Vec::new(),
            warnings: Vec::new(),
        };

        if from == to {
            result.reasons.push("Cannot sync to same environment".to_string());
        } else if !can_sync(from, to) {
            result
                .reasons
                .push(format!("Sync from {} to {} is not supported", from, to));
        }

        let source = self.profile(from);
        let target = self.profile(to);
        for field in source.schema.required_fields() {
            if !target.schema.declares(field) {
                result.reasons.push(format!(
                    "Field '{}' required by {} is not declared by {}",
                    field, from, to
                ));
            }
        }
        for (field, rule) in source.schema.fields() {
            if !rule.required && !target.schema.declares(field) {
                result.warnings.push(format!(
                    "Field '{}' is not declared by {} and will be carried unvalidated",
                    field, to
                ));
            }
        }

        result.compatible = result.reasons.is_empty();
        result
    }

    /// Reshape an export for another environment and re-checksum it.
    pub fn transform_data(&self, export: &ExportedData, to: Environment) -> Result<ExportedData> {
        let from = export.environment;
        let (data, applied) = run_pipeline(export.data.clone(), self.profile(from), self.profile(to))?;
        let checksum = checksum_json(&data)?;

        let mut metadata = export.metadata.clone();
        metadata.source_environment = Some(metadata.source_environment.unwrap_or(from));
        metadata.transformations.extend(applied);
        metadata.item_count = data.len();

        Ok(ExportedData {
            version: export.version.clone(),
            environment: to,
            timestamp: now_millis(),
            data,
            metadata,
            checksum,
        })
    }

    /// Import an export into `target`'s store, replacing its data.
    pub async fn import_data(&self, export: ExportedData, target: Environment) -> ImportResult {
        match self.try_import(export, target).await {
            Ok(imported) => ImportResult {
                success: true,
                environment: target,
                items_imported: imported.items,
                backup_id: Some(imported.backup_id),
                transformations: imported.transformations,
                warnings: imported.warnings,
                error: None,
                error_kind: None,
            },
            Err(e) => {
                warn!(
                    subsystem = "sync",
                    component = "manager",
                    op = "import",
                    environment = %target,
                    error_kind = e.kind(),
                    error = %e,
                    "Import rejected"
                );
                ImportResult {
                    success: false,
                    environment: target,
                    items_imported: 0,
                    backup_id: None,
                    transformations: Vec::new(),
                    warnings: Vec::new(),
                    error: Some(e.to_string()),
                    error_kind: Some(e.kind().to_string()),
                }
            }
        }
    }

    async fn try_import(&self, export: ExportedData, target: Environment) -> Result<Imported> {
        let start = Instant::now();

        if !is_valid_version(&export.version) {
            return Err(Error::Validation(format!(
                "Export has invalid version: {}",
                export.version
            )));
        }
        if export.checksum.trim().is_empty() {
            return Err(Error::Validation(
                "Export is missing required field: checksum".to_string(),
            ));
        }
        if checksum_json(&export.data)? != export.checksum {
            return Err(Error::Integrity(format!(
                "Export checksum mismatch for data from {}",
                export.environment
            )));
        }

        let storage = self.store(target)?;
        let current = version_or_default(storage.as_ref(), &self.config.default_version).await?;
        check_major_compatibility("Import", &export.version, &current)?;

        let export = if export.environment == target {
            export
        } else {
            let compatibility = self.validate_sync_compatibility(export.environment, target);
            if !compatibility.compatible {
                return Err(Error::Compatibility(compatibility.reasons.join("; ")));
            }
            self.transform_data(&export, target)?
        };

        let warnings = validate_layout(&export.data, self.profile(target))
            .into_result(&format!("Data does not fit the {} layout", target))?;

        let backups = self.backups_for(target)?;
        let backup = backups.create_backup(true).await?;

        let items = export.data.len();
        if let Err(e) = commit_data(storage.as_ref(), export.data, &export.version).await {
            backups.recover_from_snapshot(&backup, "import").await;
            return Err(e);
        }

        info!(
            subsystem = "sync",
            component = "manager",
            op = "import",
            environment = %target,
            version = %export.version,
            backup_id = %backup.id,
            item_count = items,
            duration_ms = start.elapsed().as_millis() as u64,
            "Data imported"
        );

        Ok(Imported {
            items,
            backup_id: backup.id,
            transformations: export.metadata.transformations,
            warnings,
        })
    }

    /// Compatibility check, export, transform and import in one call.
    pub async fn sync_data(&self, from: Environment, to: Environment) -> SyncResult {
        let compatibility = self.validate_sync_compatibility(from, to);
        let mut result = SyncResult {
            success: false,
            from,
            to,
            items_synced: 0,
            backup_id: None,
            transformations: Vec::new(),
            compatibility: compatibility.clone(),
            warnings: compatibility.warnings.clone(),
            error: None,
            error_kind: None,
        };

        if !compatibility.compatible {
            let e = Error::Compatibility(compatibility.reasons.join("; "));
            warn!(
                subsystem = "sync",
                component = "manager",
                op = "sync",
                from_env = %from,
                to_env = %to,
                error = %e,
                "Sync rejected"
            );
            result.error = Some(e.to_string());
            result.error_kind = Some(e.kind().to_string());
            return result;
        }

        let transformed = match self
            .export_data(from)
            .await
            .and_then(|export| self.transform_data(&export, to))
        {
            Ok(transformed) => transformed,
            Err(e) => {
                result.error = Some(e.to_string());
                result.error_kind = Some(e.kind().to_string());
                return result;
            }
        };

        let imported = self.import_data(transformed, to).await;
        result.success = imported.success;
        result.items_synced = imported.items_imported;
        result.backup_id = imported.backup_id;
        result.transformations = imported.transformations;
        result.warnings.extend(imported.warnings);
        result.error = imported.error;
        result.error_kind = imported.error_kind;

        if result.success {
            info!(
                subsystem = "sync",
                component = "manager",
                op = "sync",
                from_env = %from,
                to_env = %to,
                item_count = result.items_synced,
                "Sync completed"
            );
        }
        result
    }
}
