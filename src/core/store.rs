/// Backup destination management
///
/// Owns the destination directory: enumerates, names, locates, copies and
/// deletes backup artifacts, and applies the retention policy. Only the
/// `local` destination type is fully supported; other types are accepted by
/// the configuration and degrade to "not supported" here, at the point of
/// use.
///
/// Single-writer assumption: deletions from a retention run and a concurrent
/// listing by a second process are not coordinated. The deployment is
/// expected to run one vw-backup instance per destination.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

use super::error::BackupError;
use super::retention::{classify, RetentionPolicy};
use crate::utils::{ARTIFACT_PREFIX, LOCAL_DESTINATION, TIMESTAMP_FORMAT};

/// One completed backup snapshot in the destination.
///
/// Identity is the timestamp parsed from the filename; artifacts are never
/// mutated in place, only created by a backup run and deleted by retention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub file_name: String,
    pub timestamp: NaiveDateTime,
    /// Derived from the `.gpg` filename suffix, the sole encryption marker.
    pub encrypted: bool,
}

/// Parse an artifact filename into its structured identity.
///
/// Grammar: `vaultwarden-data-<%Y%m%dT%H%M%S>.tar.gz[.gpg]`. Returns None
/// for anything else, including names whose digits are not a valid calendar
/// timestamp.
pub fn parse_artifact_name(path: &Path) -> Option<BackupArtifact> {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let name_re = NAME_RE.get_or_init(|| {
        Regex::new(r"^vaultwarden-data-(\d{8}T\d{6})\.tar\.gz(\.gpg)?$").unwrap()
    });

    let file_name = path.file_name()?.to_str()?;
    let captures = name_re.captures(file_name)?;
    let timestamp = NaiveDateTime::parse_from_str(&captures[1], TIMESTAMP_FORMAT).ok()?;

    Some(BackupArtifact {
        path: path.to_path_buf(),
        file_name: file_name.to_string(),
        timestamp,
        encrypted: captures.get(2).is_some(),
    })
}

/// Filename stem for a new artifact, without the archive suffix
pub fn artifact_base_name(timestamp: NaiveDateTime) -> String {
    format!("{}{}", ARTIFACT_PREFIX, timestamp.format(TIMESTAMP_FORMAT))
}

pub struct BackupStore {
    dest_type: String,
    dest_path: PathBuf,
    policy: RetentionPolicy,
}

impl BackupStore {
    pub fn new(dest_type: &str, dest_path: &Path, policy: RetentionPolicy) -> Self {
        if dest_type != LOCAL_DESTINATION {
            tracing::warn!(
                "Destination type '{}' is not fully supported; only local operations are available",
                dest_type
            );
        }
        Self {
            dest_type: dest_type.to_string(),
            dest_path: dest_path.to_path_buf(),
            policy,
        }
    }

    pub fn destination(&self) -> &Path {
        &self.dest_path
    }

    fn is_local(&self) -> bool {
        self.dest_type == LOCAL_DESTINATION
    }

    /// All recognized artifacts in the destination, newest first.
    ///
    /// Files that do not match the naming convention are logged and left
    /// untouched; they never enter retention or lookup.
    pub fn list(&self) -> Result<Vec<BackupArtifact>, BackupError> {
        if !self.is_local() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dest_path).map_err(|e| BackupError::StoreUnavailable {
            path: self.dest_path.clone(),
            reason: e.to_string(),
        })?;

        let mut artifacts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BackupError::StoreUnavailable {
                path: self.dest_path.clone(),
                reason: e.to_string(),
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match parse_artifact_name(&path) {
                Some(artifact) => artifacts.push(artifact),
                None => {
                    tracing::warn!(
                        "Skipping unrecognized file in destination: {}",
                        entry.file_name().to_string_lossy()
                    );
                }
            }
        }

        artifacts.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });
        Ok(artifacts)
    }

    /// Find an artifact by identifier: the literal `latest` resolves to the
    /// newest artifact, anything else is a substring match against artifact
    /// filenames in newest-first order.
    pub fn locate(&self, identifier: &str) -> Result<BackupArtifact, BackupError> {
        if !self.is_local() {
            return Err(BackupError::NotSupported(self.dest_type.clone()));
        }

        let mut artifacts = self.list()?;
        if artifacts.is_empty() {
            return Err(BackupError::NotFound(identifier.to_string()));
        }

        if identifier == "latest" {
            return Ok(artifacts.remove(0));
        }

        artifacts
            .into_iter()
            .find(|a| a.file_name.contains(identifier))
            .ok_or_else(|| BackupError::NotFound(identifier.to_string()))
    }

    /// Run the retention engine over the current listing and delete the
    /// purge set. Deletions are independent: one failure is logged and does
    /// not abort the others. Never fatal to the caller; a backup run that
    /// cannot prune is still a successful backup.
    pub fn apply_retention(&self) {
        if !self.is_local() {
            tracing::warn!("Retention skipped: only supported for the local destination type");
            return;
        }

        tracing::info!(
            "Applying retention policy to {} (daily={}, weekly={}, monthly={})",
            self.dest_path.display(),
            self.policy.daily,
            self.policy.weekly,
            self.policy.monthly
        );

        let artifacts = match self.list() {
            Ok(artifacts) => artifacts,
            Err(e) => {
                tracing::error!("Retention skipped, cannot list destination: {}", e);
                return;
            }
        };
        if artifacts.is_empty() {
            tracing::info!("No existing backups found");
            return;
        }

        let decision = classify(&artifacts, &self.policy);
        if decision.purge.is_empty() {
            tracing::info!("No backups needed deletion according to retention policy");
            return;
        }

        tracing::info!("Deleting {} backups per retention policy", decision.purge.len());
        for artifact in &decision.purge {
            match fs::remove_file(&artifact.path) {
                Ok(()) => tracing::info!("Deleted old backup: {}", artifact.file_name),
                Err(e) => {
                    tracing::error!("Failed to delete backup {}: {}", artifact.file_name, e)
                }
            }
        }
    }

    /// Duplicate an artifact's bytes to `destination` without touching the
    /// original. Fatal on failure; a restore cannot proceed without the
    /// bytes.
    pub fn copy_to(&self, artifact: &BackupArtifact, destination: &Path) -> Result<(), BackupError> {
        if !self.is_local() {
            return Err(BackupError::NotSupported(self.dest_type.clone()));
        }

        tracing::info!(
            "Fetching backup '{}' to {}",
            artifact.file_name,
            destination.display()
        );
        fs::copy(&artifact.path, destination)?;
        Ok(())
    }
}
