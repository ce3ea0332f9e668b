/// YAML configuration for vw-backup
///
/// Loaded and validated once at startup; a bad configuration is fatal
/// before anything runs and is never raised mid-workflow.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::BackupError;
use super::retention::RetentionPolicy;
use crate::utils::LOCAL_DESTINATION;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub vaultwarden: VaultwardenConfig,
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultwardenConfig {
    /// Name of the vaultwarden Docker container
    pub container_name: String,
    /// Host path of the vaultwarden data directory
    pub data_dir: PathBuf,
    /// When true, container stop/start become successful no-ops
    #[serde(default)]
    pub skip_start_stop: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    pub schedule: ScheduleConfig,
    pub destination: DestinationConfig,
    pub retention: RetentionPolicy,
    pub restore: RestoreConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub interval_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinationConfig {
    /// Destination type; only "local" is fully supported. Other values are
    /// accepted here and degrade to "not supported" at the point of use.
    #[serde(rename = "type")]
    pub kind: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestoreConfig {
    /// Staging directory used only during restore
    pub temp_dir: PathBuf,
    pub owner_uid: Option<u32>,
    pub owner_gid: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncryptionConfig {
    #[serde(default)]
    pub enabled: bool,
    pub gpg_key_id: Option<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BackupError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BackupError::ConfigInvalid(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            BackupError::ConfigInvalid(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_yaml::from_str(&contents).map_err(|e| {
            BackupError::ConfigInvalid(format!("failed to parse {}: {}", path.display(), e))
        })?;

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(BackupError::ConfigInvalid(errors.join("; ")));
        }

        if config.backup.destination.kind != LOCAL_DESTINATION {
            tracing::warn!(
                "Destination type '{}' is not yet fully supported",
                config.backup.destination.kind
            );
        }

        Ok(config)
    }

    /// Collect every violation instead of stopping at the first; the
    /// operator gets one complete report.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.vaultwarden.container_name.trim().is_empty() {
            errors.push("vaultwarden.container_name must not be empty".to_string());
        }
        if self.vaultwarden.data_dir.as_os_str().is_empty() {
            errors.push("vaultwarden.data_dir must not be empty".to_string());
        }
        if self.backup.schedule.interval_minutes == 0 {
            errors.push("backup.schedule.interval_minutes must be a positive integer".to_string());
        }
        if self.backup.destination.kind.trim().is_empty() {
            errors.push("backup.destination.type must not be empty".to_string());
        }
        if self.backup.destination.path.as_os_str().is_empty() {
            errors.push("backup.destination.path must not be empty".to_string());
        }
        if self.backup.restore.temp_dir.as_os_str().is_empty() {
            errors.push("backup.restore.temp_dir must not be empty".to_string());
        }
        if self.backup.encryption.enabled
            && self
                .backup
                .encryption
                .gpg_key_id
                .as_deref()
                .map(|k| k.trim().is_empty())
                .unwrap_or(true)
        {
            errors.push(
                "backup.encryption.gpg_key_id is required when encryption is enabled".to_string(),
            );
        }

        errors
    }
}
