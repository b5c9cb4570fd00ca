//! Orchestration of migrations and rollbacks over a live store.
//!
//! Every step runs on an in-memory copy of the data. The store is written
//! only after the final schema check passes, and a failure during that write
//! restores the backup taken before the operation started.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use statekeep_core::{
    checksum_json, is_valid_version, now_millis, DataMap, Error, MigrationHistoryRecord, Result,
    SchemaRegistry, Storage, ValidationResult,
};

use super::history::MigrationHistory;
use super::registry::{Migration, MigrationInfo, MigrationRegistry};
use crate::backup::BackupManager;
use crate::commit::{commit_data, stored_data_checksum, version_or_default};
use crate::config::EngineConfig;
use crate::gate::{require_valid, validate_for_version};

/// Outcome of [`MigrationManager::migrate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub success: bool,
    pub from_version: String,
    pub to_version: String,
    pub migration_count: usize,
    pub applied_migrations: Vec<String>,
    /// Pre-migration backup, when one was taken.
    pub backup_id: Option<String>,
    /// Whether the pre-migration backup was put back after a failed write.
    pub rolled_back: bool,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub duration_ms: u64,
}

/// Outcome of [`MigrationManager::rollback_migration`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResult {
    pub success: bool,
    /// Version the store was at before the rollback.
    pub from_version: String,
    pub to_version: String,
    pub migration_count: usize,
    /// Keys of the reverted migrations, in the order they were reverted.
    pub reverted_migrations: Vec<String>,
    pub backup_id: Option<String>,
    pub rolled_back: bool,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub duration_ms: u64,
}

impl MigrationResult {
    fn pending(from: &str, to: &str) -> Self {
        Self {
            success: false,
            from_version: from.to_string(),
            to_version: to.to_string(),
            migration_count: 0,
            applied_migrations: Vec::new(),
            backup_id: None,
            rolled_back: false,
            warnings: Vec::new(),
            error: None,
            error_kind: None,
            duration_ms: 0,
        }
    }
}

impl RollbackResult {
    fn pending(target: &str) -> Self {
        Self {
            success: false,
            from_version: String::new(),
            to_version: target.to_string(),
            migration_count: 0,
            reverted_migrations: Vec::new(),
            backup_id: None,
            rolled_back: false,
            warnings: Vec::new(),
            error: None,
            error_kind: None,
            duration_ms: 0,
        }
    }
}

/// Data plus accumulated warnings after a chain of steps.
struct Transformed {
    data: DataMap,
    warnings: Vec<String>,
}

/// Runs migrations and rollbacks against one store.
#[derive(Clone)]
pub struct MigrationManager {
    storage: Arc<dyn Storage>,
    schemas: Arc<dyn SchemaRegistry>,
    registry: Arc<MigrationRegistry>,
    backups: BackupManager,
    history: MigrationHistory,
    config: EngineConfig,
}

impl MigrationManager {
    pub fn new(
        storage: Arc<dyn Storage>,
        schemas: Arc<dyn SchemaRegistry>,
        registry: Arc<MigrationRegistry>,
        config: EngineConfig,
    ) -> Self {
        let backups = BackupManager::new(storage.clone(), schemas.clone(), config.clone());
        let history = MigrationHistory::new(storage.clone(), config.history_limit);
        Self {
            storage,
            schemas,
            registry,
            backups,
            history,
            config,
        }
    }

    /// Use a differently configured backup manager (e.g. another codec).
    pub fn with_backup_manager(mut self, backups: BackupManager) -> Self {
        self.backups = backups;
        self
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Migrate the store from `from` to `to`.
    ///
    /// Equal versions are a successful no-op. Otherwise the path is resolved
    /// first, so an unreachable target fails without touching the store. A
    /// full backup is then taken, the data is validated against `from`,
    /// walked through every step (each result validated against the step's
    /// target schema) and validated against `to` before it is committed
    /// together with the new version marker.
    pub async fn migrate(&self, from: &str, to: &str) -> MigrationResult {
        let start = Instant::now();
        let mut result = MigrationResult::pending(from, to);

        if let Err(e) = check_versions(&[from, to]) {
            return fail_migration(result, e, start);
        }

        if from == to {
            debug!(
                subsystem = "migration",
                component = "manager",
                op = "migrate",
                from_version = %from,
                "Versions equal, nothing to migrate"
            );
            result.success = true;
            result.duration_ms = start.elapsed().as_millis() as u64;
            return result;
        }

        let Some(path) = self.registry.find_path(from, to) else {
            let e = Error::PathNotFound {
                from: from.to_string(),
                to: to.to_string(),
            };
            self.record(&result, None, &Some(e.to_string())).await;
            return fail_migration(result, e, start);
        };
        let keys: Vec<String> = path.iter().map(|m| m.key()).collect();

        let backup = match self.backups.create_backup(true).await {
            Ok(backup) => backup,
            Err(e) => {
                self.record(&result, None, &Some(e.to_string())).await;
                return fail_migration(result, e, start);
            }
        };
        result.backup_id = Some(backup.id.clone());

        let transformed = match self.apply_forward(from, to, &path).await {
            Ok(transformed) => transformed,
            Err(e) => {
                debug!(
                    subsystem = "migration",
                    component = "manager",
                    op = "migrate",
                    backup_id = %backup.id,
                    "Failed before commit, store untouched"
                );
                self.record(&result, None, &Some(e.to_string())).await;
                return fail_migration(result, e, start);
            }
        };
        result.warnings = transformed.warnings;

        if let Err(e) = commit_data(self.storage.as_ref(), transformed.data, to).await {
            result.rolled_back = self.backups.recover_from_snapshot(&backup, "migrate").await;
            self.record(&result, None, &Some(e.to_string())).await;
            return fail_migration(result, e, start);
        }

        result.success = true;
        result.migration_count = keys.len();
        result.applied_migrations = keys;
        result.duration_ms = start.elapsed().as_millis() as u64;
        self.record(&result, Some(result.applied_migrations.as_slice()), &None)
            .await;

        info!(
            subsystem = "migration",
            component = "manager",
            op = "migrate",
            from_version = %from,
            to_version = %to,
            backup_id = %backup.id,
            step_count = result.migration_count,
            duration_ms = result.duration_ms,
            "Migration completed"
        );
        result
    }

    /// Load, validate and walk `path` forward in memory.
    async fn apply_forward(
        &self,
        from: &str,
        to: &str,
        path: &[&dyn Migration],
    ) -> Result<Transformed> {
        let mut warnings = Vec::new();

        let stored = self.storage.get_version().await?;
        if let Some(stored) = stored.filter(|v| v != from) {
            warnings.push(format!(
                "Stored version {} differs from requested source version {}",
                stored, from
            ));
        }

        let mut data = self.storage.load_all_data().await?;
        warnings.extend(require_valid(self.schemas.as_ref(), &data, from)?);

        for migration in path {
            debug!(
                subsystem = "migration",
                component = "manager",
                op = "apply_step",
                migration_key = %migration.key(),
                "Applying migration step"
            );
            data = migration
                .apply(data)
                .map_err(|e| Error::Migration(format!("Migration {} failed: {}", migration.key(), e)))?;
            require_valid(self.schemas.as_ref(), &data, migration.to_version())?;
        }

        warnings.extend(require_valid(self.schemas.as_ref(), &data, to)?);
        Ok(Transformed { data, warnings })
    }

    /// Revert the store to `target` by walking the path from `target` to the
    /// current version backwards, calling each migration's `rollback`.
    ///
    /// Each reverted step is validated against its origin schema and the
    /// result against `target` before anything is written.
    pub async fn rollback_migration(&self, target: &str) -> RollbackResult {
        let start = Instant::now();
        let mut result = RollbackResult::pending(target);

        if let Err(e) = check_versions(&[target]) {
            return fail_rollback(result, e, start);
        }

        let current = match self.current_version().await {
            Ok(current) => current,
            Err(e) => return fail_rollback(result, e, start),
        };
        result.from_version = current.clone();

        if current == target {
            result.success = true;
            result.duration_ms = start.elapsed().as_millis() as u64;
            return result;
        }

        let Some(path) = self.registry.find_path(target, &current) else {
            let e = Error::PathNotFound {
                from: current.clone(),
                to: target.to_string(),
            };
            self.record_rollback(&result, &Some(e.to_string())).await;
            return fail_rollback(result, e, start);
        };
        let keys: Vec<String> = path.iter().rev().map(|m| m.key()).collect();
        result.reverted_migrations = keys.clone();

        let backup = match self.backups.create_backup(true).await {
            Ok(backup) => backup,
            Err(e) => {
                self.record_rollback(&result, &Some(e.to_string())).await;
                return fail_rollback(result, e, start);
            }
        };
        result.backup_id = Some(backup.id.clone());

        let transformed = match self.apply_backward(&current, target, &path).await {
            Ok(transformed) => transformed,
            Err(e) => {
                self.record_rollback(&result, &Some(e.to_string())).await;
                return fail_rollback(result, e, start);
            }
        };
        result.warnings = transformed.warnings;

        if let Err(e) = commit_data(self.storage.as_ref(), transformed.data, target).await {
            result.rolled_back = self.backups.recover_from_snapshot(&backup, "rollback").await;
            self.record_rollback(&result, &Some(e.to_string())).await;
            return fail_rollback(result, e, start);
        }

        result.success = true;
        result.migration_count = keys.len();
        result.duration_ms = start.elapsed().as_millis() as u64;
        self.record_rollback(&result, &None).await;

        info!(
            subsystem = "migration",
            component = "manager",
            op = "rollback",
            from_version = %current,
            to_version = %target,
            backup_id = %backup.id,
            step_count = result.migration_count,
            duration_ms = result.duration_ms,
            "Rollback completed"
        );
        result
    }

    async fn apply_backward(
        &self,
        current: &str,
        target: &str,
        path: &[&dyn Migration],
    ) -> Result<Transformed> {
        let mut warnings = Vec::new();
        let mut data = self.storage.load_all_data().await?;
        warnings.extend(require_valid(self.schemas.as_ref(), &data, current)?);

        for migration in path.iter().rev() {
            debug!(
                subsystem = "migration",
                component = "manager",
                op = "revert_step",
                migration_key = %migration.key(),
                "Reverting migration step"
            );
            data = migration.rollback(data).map_err(|e| {
                Error::Migration(format!("Rollback of {} failed: {}", migration.key(), e))
            })?;
            require_valid(self.schemas.as_ref(), &data, migration.from_version())?;
        }

        warnings.extend(require_valid(self.schemas.as_ref(), &data, target)?);
        Ok(Transformed { data, warnings })
    }

    /// Migrate from the stored version to the highest version reachable from
    /// it.
    pub async fn migrate_to_latest(&self) -> MigrationResult {
        let current = match self.current_version().await {
            Ok(current) => current,
            Err(e) => return fail_migration(MigrationResult::pending("", ""), e, Instant::now()),
        };
        let latest = self
            .registry
            .latest_reachable(&current)
            .unwrap_or_else(|| current.clone());
        self.migrate(&current, &latest).await
    }

    /// Check `data` against the schema for `version`, and against the
    /// checksum recorded by the last engine commit.
    ///
    /// A checksum mismatch is reported as a warning: the application writes
    /// keys directly between commits, so a stale checksum is expected and
    /// only schema violations are hard errors.
    pub async fn validate_data(&self, data: &DataMap, version: &str) -> ValidationResult {
        let mut result = validate_for_version(self.schemas.as_ref(), data, version);

        match stored_data_checksum(self.storage.as_ref()).await {
            Ok(Some(expected)) => match checksum_json(data) {
                Ok(actual) if actual == expected => {}
                Ok(_) => result.add_warning(
                    "Data checksum does not match the checksum recorded at the last commit",
                ),
                Err(e) => result.add_warning(format!("Could not compute data checksum: {}", e)),
            },
            Ok(None) => {}
            Err(e) => result.add_warning(format!("Could not read stored data checksum: {}", e)),
        }

        result
    }

    /// Migration log, newest first.
    pub async fn get_migration_history(&self) -> Result<Vec<MigrationHistoryRecord>> {
        self.history.load().await
    }

    pub async fn clear_migration_history(&self) -> Result<()> {
        self.history.clear().await
    }

    pub fn get_available_migrations(&self) -> Vec<MigrationInfo> {
        self.registry.available()
    }

    /// Whether a path exists. Never fails; malformed versions are simply
    /// unavailable.
    pub fn is_migration_available(&self, from: &str, to: &str) -> bool {
        self.registry.is_available(from, to)
    }

    /// Stored version marker, or the configured default for a new store.
    pub async fn current_version(&self) -> Result<String> {
        version_or_default(self.storage.as_ref(), &self.config.default_version).await
    }

    async fn record(&self, result: &MigrationResult, keys: Option<&[String]>, error: &Option<String>) {
        let record = MigrationHistoryRecord {
            from_version: result.from_version.clone(),
            to_version: result.to_version.clone(),
            timestamp: now_millis(),
            backup_id: result.backup_id.clone(),
            applied_migrations: keys.map(<[String]>::to_vec).unwrap_or_default(),
            success: error.is_none(),
            error: error.clone(),
        };
        self.append_history(record).await;
    }

    async fn record_rollback(&self, result: &RollbackResult, error: &Option<String>) {
        let record = MigrationHistoryRecord {
            from_version: result.from_version.clone(),
            to_version: result.to_version.clone(),
            timestamp: now_millis(),
            backup_id: result.backup_id.clone(),
            applied_migrations: result.reverted_migrations.clone(),
            success: error.is_none(),
            error: error.clone(),
        };
        self.append_history(record).await;
    }

    async fn append_history(&self, record: MigrationHistoryRecord) {
        if let Err(e) = self.history.append(record).await {
            warn!(
                subsystem = "migration",
                component = "history",
                op = "append",
                error = %e,
                "Failed to record migration history"
            );
        }
    }
}

fn fail_migration(mut result: MigrationResult, e: Error, start: Instant) -> MigrationResult {
    warn!(
        subsystem = "migration",
        component = "manager",
        op = "migrate",
        from_version = %result.from_version,
        to_version = %result.to_version,
        rolled_back = result.rolled_back,
        error_kind = e.kind(),
        error = %e,
        "Migration failed"
    );
    result.success = false;
    result.error = Some(e.to_string());
    result.error_kind = Some(e.kind().to_string());
    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

fn fail_rollback(mut result: RollbackResult, e: Error, start: Instant) -> RollbackResult {
    warn!(
        subsystem = "migration",
        component = "manager",
        op = "rollback",
        from_version = %result.from_version,
        to_version = %result.to_version,
        rolled_back = result.rolled_back,
        error_kind = e.kind(),
        error = %e,
        "Rollback failed"
    );
    result.success = false;
    result.error = Some(e.to_string());
    result.error_kind = Some(e.kind().to_string());
    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

fn check_versions(versions: &[&str]) -> Result<()> {
    match versions.iter().find(|v| !is_valid_version(v)) {
        Some(bad) => Err(Error::InvalidInput(format!(
            "Invalid version format: {} (expected major.minor.patch)",
            bad
        ))),
        None => Ok(()),
    }
}
