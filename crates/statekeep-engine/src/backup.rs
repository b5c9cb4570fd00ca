//! Integrity-verified snapshots of a whole store.
//!
//! A backup captures every non-reserved key, optionally with sensitive
//! fields stripped. The payload is serialized, sealed through the
//! [`BackupCodec`] (keyed by the backup id) and checksummed over the sealed
//! bytes, then persisted under `backup_<id>` in the same store.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use statekeep_codec::{BackupCodec, CodecError};
use statekeep_core::defaults::{BACKUP_KEY_PREFIX, SENSITIVE_FIELDS};
use statekeep_core::{
    checksum_bytes, check_major_compatibility, is_valid_version, now_millis, verify_checksum,
    BackupData, BackupExport, BackupInfo, BackupMetadata, DataMap, Error, Result, SchemaRegistry,
    Storage,
};

use crate::commit::{commit_data, version_or_default};
use crate::config::EngineConfig;
use crate::gate::require_valid;

/// Outcome of a restore or import. Failures are reported here, never as
/// `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    pub success: bool,
    /// Backup that was (or was to be) restored.
    pub backup_id: String,
    /// Snapshot of the pre-restore state, for undoing the restore.
    pub safety_backup_id: Option<String>,
    /// Version marker after the restore.
    pub version: Option<String>,
    pub items_restored: usize,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}

impl RestoreResult {
    fn failed(backup_id: &str, err: &Error) -> Self {
        Self {
            success: false,
            backup_id: backup_id.to_string(),
            safety_backup_id: None,
            version: None,
            items_restored: 0,
            error: Some(err.to_string()),
            error_kind: Some(err.kind().to_string()),
        }
    }
}

/// Storage key of a backup.
pub fn backup_key(id: &str) -> String {
    format!("{}{}", BACKUP_KEY_PREFIX, id)
}

/// Creates, restores and manages backups of one store.
#[derive(Clone)]
pub struct BackupManager {
    storage: Arc<dyn Storage>,
    schemas: Arc<dyn SchemaRegistry>,
    codec: BackupCodec,
    config: EngineConfig,
}

impl BackupManager {
    pub fn new(
        storage: Arc<dyn Storage>,
        schemas: Arc<dyn SchemaRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            schemas,
            codec: BackupCodec::default(),
            config,
        }
    }

    /// Substitute the compression/obfuscation stages.
    pub fn with_codec(mut self, codec: BackupCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot the current store.
    ///
    /// Without `include_sensitive_data`, the fields in
    /// [`SENSITIVE_FIELDS`] are removed at any depth. Backups beyond the
    /// retention cap are pruned afterwards, oldest first; a pruning failure
    /// is logged and does not fail the backup.
    pub async fn create_backup(&self, include_sensitive_data: bool) -> Result<BackupData> {
        self.create_backup_keeping(include_sensitive_data, None).await
    }

    /// [`create_backup`](Self::create_backup), with `keep` exempt from the
    /// pruning that follows.
    async fn create_backup_keeping(
        &self,
        include_sensitive_data: bool,
        keep: Option<&str>,
    ) -> Result<BackupData> {
        let start = Instant::now();
        let id = Uuid::now_v7().to_string();

        let mut data = self.storage.load_all_data().await?;
        if !include_sensitive_data {
            strip_sensitive_fields(&mut data);
        }
        let item_count = data.len();
        let version = version_or_default(self.storage.as_ref(), &self.config.default_version).await?;

        let plaintext = serde_json::to_vec(&data)?;
        let sealed = self.codec.seal(&plaintext, &id).map_err(codec_error)?;

        let backup = BackupData {
            id: id.clone(),
            timestamp: now_millis(),
            version,
            size: sealed.len(),
            checksum: checksum_bytes(&sealed),
            data: sealed,
            metadata: BackupMetadata {
                environment: self.config.environment,
                user_agent: self.config.user_agent.clone(),
                extension_version: self.config.extension_version.clone(),
                include_sensitive_data,
                compression: self.codec.compression_name().to_string(),
                item_count,
            },
        };

        self.save_backup(&backup).await?;

        if let Err(e) = self.prune_backups(keep).await {
            warn!(
                subsystem = "backup",
                component = "manager",
                op = "cleanup",
                error = %e,
                "Failed to prune old backups"
            );
        }

        info!(
            subsystem = "backup",
            component = "manager",
            op = "create",
            backup_id = %backup.id,
            version = %backup.version,
            item_count,
            include_sensitive_data,
            duration_ms = start.elapsed().as_millis() as u64,
            "Backup created"
        );
        Ok(backup)
    }

    /// Restore a backup over the live store.
    ///
    /// The backup must carry its required fields, pass its checksum, share
    /// the stored data's major version and validate against the schema of
    /// its own version. A safety backup of the current state is taken before
    /// anything is overwritten; if the write fails part way, that snapshot
    /// is put back. The backup being restored is never pruned by the safety
    /// backup, even when it is the oldest one stored.
    pub async fn restore_backup(&self, backup: &BackupData) -> RestoreResult {
        let start = Instant::now();

        match self.try_restore(backup).await {
            Ok((safety_backup_id, items_restored)) => {
                info!(
                    subsystem = "backup",
                    component = "manager",
                    op = "restore",
                    backup_id = %backup.id,
                    safety_backup_id = %safety_backup_id,
                    version = %backup.version,
                    item_count = items_restored,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Backup restored"
                );
                RestoreResult {
                    success: true,
                    backup_id: backup.id.clone(),
                    safety_backup_id: Some(safety_backup_id),
                    version: Some(backup.version.clone()),
                    items_restored,
                    error: None,
                    error_kind: None,
                }
            }
            Err(e) => {
                warn!(
                    subsystem = "backup",
                    component = "manager",
                    op = "restore",
                    backup_id = %backup.id,
                    error_kind = e.kind(),
                    error = %e,
                    "Backup restore rejected"
                );
                RestoreResult::failed(&backup.id, &e)
            }
        }
    }

    async fn try_restore(&self, backup: &BackupData) -> Result<(String, usize)> {
        let data = self.open_backup(backup)?;

        let current =
            version_or_default(self.storage.as_ref(), &self.config.default_version).await?;
        check_major_compatibility("Backup", &backup.version, &current)?;
        require_valid(self.schemas.as_ref(), &data, &backup.version)?;

        let safety = self.create_backup_keeping(true, Some(&backup.id)).await?;
        let items = data.len();

        if let Err(e) = commit_data(self.storage.as_ref(), data, &backup.version).await {
            self.recover_from_snapshot(&safety, "restore").await;
            return Err(e);
        }

        Ok((safety.id, items))
    }

    /// Put a snapshot back without the compatibility gate or a new safety
    /// backup. Used to undo a failed operation.
    pub(crate) async fn restore_snapshot(&self, snapshot: &BackupData) -> Result<()> {
        let data = self.open_backup(snapshot)?;
        commit_data(self.storage.as_ref(), data, &snapshot.version).await
    }

    /// Best-effort [`restore_snapshot`](Self::restore_snapshot) after a
    /// failed write; returns whether the snapshot went back in.
    pub(crate) async fn recover_from_snapshot(&self, snapshot: &BackupData, op: &str) -> bool {
        match self.restore_snapshot(snapshot).await {
            Ok(()) => {
                warn!(
                    subsystem = "backup",
                    component = "manager",
                    op = op,
                    backup_id = %snapshot.id,
                    "Write failed, pre-operation snapshot restored"
                );
                true
            }
            Err(e) => {
                error!(
                    subsystem = "backup",
                    component = "manager",
                    op = op,
                    backup_id = %snapshot.id,
                    error = %e,
                    "Write failed and the pre-operation snapshot could not be restored"
                );
                false
            }
        }
    }

    /// Check required fields and the checksum, then decode the payload.
    fn open_backup(&self, backup: &BackupData) -> Result<DataMap> {
        validate_backup_fields(backup)?;

        if !verify_checksum(&backup.data, &backup.checksum) {
            return Err(Error::Integrity(format!(
                "Checksum mismatch: corrupted backup {}",
                backup.id
            )));
        }

        let plaintext = self
            .codec
            .unseal(&backup.data, &backup.id)
            .map_err(codec_error)?;
        let value: Value = serde_json::from_slice(&plaintext).map_err(|e| {
            Error::Integrity(format!("Backup {} payload is not valid JSON: {}", backup.id, e))
        })?;

        match value {
            Value::Object(data) => Ok(data),
            _ => Err(Error::Integrity(format!(
                "Backup {} payload is not an object",
                backup.id
            ))),
        }
    }

    /// Whether a backup's payload matches its recorded checksum.
    pub fn verify_backup(&self, backup: &BackupData) -> bool {
        verify_checksum(&backup.data, &backup.checksum)
    }

    /// Decode a backup's data without restoring it.
    pub fn read_backup_data(&self, backup: &BackupData) -> Result<DataMap> {
        self.open_backup(backup)
    }

    /// Stored backups, newest first.
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let mut backups: Vec<BackupInfo> = self
            .load_all_backups()
            .await?
            .iter()
            .map(BackupInfo::from)
            .collect();
        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(backups)
    }

    pub async fn get_backup(&self, id: &str) -> Result<Option<BackupData>> {
        match self.storage.get(&backup_key(id)).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                Error::Serialization(format!("Stored backup {} is malformed: {}", id, e))
            }),
        }
    }

    /// Delete a backup. Returns `false` when it did not exist.
    pub async fn delete_backup(&self, id: &str) -> Result<bool> {
        let key = backup_key(id);
        if self.storage.get(&key).await?.is_none() {
            return Ok(false);
        }
        self.storage.remove(&key).await?;

        debug!(
            subsystem = "backup",
            component = "manager",
            op = "delete",
            backup_id = %id,
            "Backup deleted"
        );
        Ok(true)
    }

    /// Wrap a stored backup in a portable envelope.
    pub async fn export_backup(&self, id: &str) -> Result<BackupExport> {
        let backup = self
            .get_backup(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Backup {}", id)))?;
        BackupExport::new(backup)
    }

    /// Store an exported backup and restore it.
    ///
    /// If a backup with the same id already exists, the imported one is
    /// renamed to `<id>_<unix millis>` and its payload re-sealed under the
    /// new id.
    pub async fn import_backup(&self, export: BackupExport) -> RestoreResult {
        let original_id = export.backup.id.clone();

        let backup = match self.prepare_import(export).await {
            Ok(backup) => backup,
            Err(e) => {
                warn!(
                    subsystem = "backup",
                    component = "manager",
                    op = "import",
                    backup_id = %original_id,
                    error_kind = e.kind(),
                    error = %e,
                    "Backup import rejected"
                );
                return RestoreResult::failed(&original_id, &e);
            }
        };

        self.restore_backup(&backup).await
    }

    async fn prepare_import(&self, export: BackupExport) -> Result<BackupData> {
        export.verify()?;
        let mut backup = export.backup;
        validate_backup_fields(&backup)?;

        if self.storage.get(&backup_key(&backup.id)).await?.is_some() {
            let renamed = format!("{}_{}", backup.id, now_millis());
            backup = self.reseal(backup, renamed)?;
        }

        self.save_backup(&backup).await?;
        Ok(backup)
    }

    /// Move a backup to a new id, re-keying its obfuscation.
    fn reseal(&self, backup: BackupData, new_id: String) -> Result<BackupData> {
        if !verify_checksum(&backup.data, &backup.checksum) {
            return Err(Error::Integrity(format!(
                "Checksum mismatch: corrupted backup {}",
                backup.id
            )));
        }
        let plaintext = self
            .codec
            .unseal(&backup.data, &backup.id)
            .map_err(codec_error)?;
        let sealed = self.codec.seal(&plaintext, &new_id).map_err(codec_error)?;

        debug!(
            subsystem = "backup",
            component = "manager",
            op = "import",
            backup_id = %backup.id,
            new_backup_id = %new_id,
            "Imported backup id collides, renamed"
        );

        Ok(BackupData {
            id: new_id,
            size: sealed.len(),
            checksum: checksum_bytes(&sealed),
            data: sealed,
            ..backup
        })
    }

    async fn save_backup(&self, backup: &BackupData) -> Result<()> {
        self.storage
            .set(&backup_key(&backup.id), serde_json::to_value(backup)?)
            .await
    }

    async fn load_all_backups(&self) -> Result<Vec<BackupData>> {
        let mut backups = Vec::new();
        for key in self.storage.keys().await? {
            let Some(id) = key.strip_prefix(BACKUP_KEY_PREFIX) else {
                continue;
            };
            let Some(value) = self.storage.get(&key).await? else {
                continue;
            };
            match serde_json::from_value::<BackupData>(value) {
                Ok(backup) => backups.push(backup),
                Err(e) => warn!(
                    subsystem = "backup",
                    component = "manager",
                    op = "list",
                    backup_id = %id,
                    error = %e,
                    "Skipping malformed backup entry"
                ),
            }
        }
        Ok(backups)
    }

    /// Delete the oldest backups beyond the retention cap. Returns the
    /// number deleted.
    pub async fn cleanup_old_backups(&self) -> Result<usize> {
        self.prune_backups(None).await
    }

    async fn prune_backups(&self, keep: Option<&str>) -> Result<usize> {
        let mut backups = self.load_all_backups().await?;
        if backups.len() <= self.config.max_backups {
            return Ok(0);
        }
        let excess = backups.len() - self.config.max_backups;

        backups.retain(|backup| Some(backup.id.as_str()) != keep);
        backups.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        for backup in backups.iter().take(excess) {
            self.storage.remove(&backup_key(&backup.id)).await?;
        }

        debug!(
            subsystem = "backup",
            component = "manager",
            op = "cleanup",
            item_count = excess,
            max_backups = self.config.max_backups,
            "Pruned old backups"
        );
        Ok(excess)
    }
}

fn validate_backup_fields(backup: &BackupData) -> Result<()> {
    let missing = if backup.id.trim().is_empty() {
        Some("id")
    } else if backup.checksum.trim().is_empty() {
        Some("checksum")
    } else if backup.version.trim().is_empty() {
        Some("version")
    } else if backup.data.is_empty() {
        Some("data")
    } else {
        None
    };

    if let Some(field) = missing {
        return Err(Error::Validation(format!(
            "Backup is missing required field: {}",
            field
        )));
    }
    if !is_valid_version(&backup.version) {
        return Err(Error::Validation(format!(
            "Backup has invalid version: {}",
            backup.version
        )));
    }
    Ok(())
}

fn codec_error(err: CodecError) -> Error {
    match err {
        CodecError::InvalidMagic => Error::Integrity(err.to_string()),
        other => Error::Codec(other.to_string()),
    }
}

/// Remove sensitive fields at any depth.
pub fn strip_sensitive_fields(data: &mut DataMap) {
    data.retain(|key, _| !SENSITIVE_FIELDS.contains(&key.as_str()));
    for value in data.values_mut() {
        strip_value(value);
    }
}

fn strip_value(value: &mut Value) {
    match value {
        Value::Object(map) => strip_sensitive_fields(map),
        Value::Array(items) => items.iter_mut().for_each(strip_value),
        _ => {}
    }
}
