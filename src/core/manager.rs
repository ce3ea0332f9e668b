/// Backup and restore orchestration
///
/// Sequences the lifecycle controller, the archive gateway and the backup
/// store into the two workflows, and owns their failure recovery. The
/// workflows are strictly sequential; the ordering between "stop service",
/// "mutate data" and "start service" is load-bearing and is never
/// reordered. Callers must not run two workflows concurrently against the
/// same destination.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::time::{interval, Duration, MissedTickBehavior};
use walkdir::WalkDir;

use super::archive::ArchiveGateway;
use super::config::Config;
use super::docker::ServiceLifecycle;
use super::error::BackupError;
use super::store::{artifact_base_name, BackupStore};
use crate::utils::{format_duration, ENCRYPTED_SUFFIX};

/// How a restore run ended when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Completed,
    /// The operator declined the confirmation prompt; nothing was changed.
    Aborted,
}

/// Confirmation seam for the destructive step of restore, injected so the
/// workflow is testable without terminal I/O.
#[cfg_attr(test, mockall::automock)]
pub trait ConfirmationProvider: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Reads the answer from stdin; only an explicit `y`/`yes` is affirmative.
pub struct TerminalConfirmation;

impl ConfirmationProvider for TerminalConfirmation {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{}", prompt);
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

pub struct BackupManager<S: ServiceLifecycle, A: ArchiveGateway> {
    config: Config,
    service: S,
    archiver: A,
    store: BackupStore,
    confirm: Box<dyn ConfirmationProvider>,
}

impl<S: ServiceLifecycle, A: ArchiveGateway> BackupManager<S, A> {
    pub fn new(config: Config, service: S, archiver: A, confirm: Box<dyn ConfirmationProvider>) -> Self {
        let store = BackupStore::new(
            &config.backup.destination.kind,
            &config.backup.destination.path,
            config.backup.retention,
        );
        Self { config, service, archiver, store, confirm }
    }

    pub fn store(&self) -> &BackupStore {
        &self.store
    }

    /// One backup run: stop the service, archive the data directory,
    /// restart the service, then prune.
    ///
    /// Once the stop has succeeded the service is restarted on every exit
    /// path, including archive failure; the restart happens before
    /// retention so a pruning problem can never keep the vault offline.
    pub async fn backup(&self) -> Result<PathBuf, BackupError> {
        tracing::info!("--- Starting vaultwarden backup ---");
        let start_time = Local::now();

        if !self.service.stop().await {
            tracing::error!("Skipping backup run because container stop failed");
            if !self.service.start().await {
                tracing::error!("Failed to restart vaultwarden container after aborted backup");
            }
            return Err(BackupError::ServiceControlFailed {
                action: "stop",
                container: self.config.vaultwarden.container_name.clone(),
            });
        }

        let dest_base = self
            .store
            .destination()
            .join(artifact_base_name(start_time.naive_local()));
        let created = self
            .archiver
            .create(&self.config.vaultwarden.data_dir, &dest_base);

        // The service comes back regardless of the archive outcome.
        if !self.service.start().await {
            tracing::error!("Failed to restart vaultwarden container after backup attempt!");
        }

        match created {
            Ok(artifact_path) => {
                tracing::info!("Successfully created backup: {}", artifact_path.display());
                self.store.apply_retention();
                tracing::info!(
                    "--- Vaultwarden backup finished --- duration: {}",
                    format_duration(Local::now() - start_time)
                );
                Ok(artifact_path)
            }
            Err(e) => {
                tracing::error!("Backup archive creation failed: {}. Aborting backup run.", e);
                Err(e)
            }
        }
    }

    /// Restore an artifact over the vaultwarden data directory.
    ///
    /// Staging is removed on success and on operator abort; on any fatal
    /// failure it is deliberately preserved for inspection. Every code
    /// path that stopped the service attempts a restart before surfacing
    /// its error.
    pub async fn restore(
        &self,
        backup_id: &str,
        target_override: Option<PathBuf>,
        assume_yes: bool,
    ) -> Result<RestoreOutcome, BackupError> {
        tracing::warn!("--- Starting vaultwarden restore --- THIS IS A DESTRUCTIVE OPERATION");
        let start_time = Local::now();

        let target = target_override.unwrap_or_else(|| self.config.vaultwarden.data_dir.clone());
        let staging = self.config.backup.restore.temp_dir.clone();
        tracing::info!("Target data directory for restore: {}", target.display());

        // Nothing has been touched yet; fail fast.
        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                BackupError::PreconditionFailed(format!(
                    "target directory {} has no parent",
                    target.display()
                ))
            })?;
        if !parent.is_dir() {
            return Err(BackupError::PreconditionFailed(format!(
                "parent directory of target does not exist: {}",
                parent.display()
            )));
        }

        let artifact = self.store.locate(backup_id)?;
        tracing::info!("Found backup to restore: {}", artifact.file_name);

        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        tracing::info!("Created temporary directory: {}", staging.display());

        // From here on a failure leaves staging in place for inspection.
        let staged = staging.join(&artifact.file_name);
        self.store.copy_to(&artifact, &staged)?;

        let archive_path = if artifact.encrypted {
            let decrypted = staging.join(artifact.file_name.trim_end_matches(ENCRYPTED_SUFFIX));
            self.archiver.decrypt(&staged, &decrypted)?;
            decrypted
        } else {
            staged
        };

        // Restoring into a running service's live directory is unsafe, so
        // unlike backup a failed stop is fatal here.
        if !self.service.stop().await {
            return Err(BackupError::ServiceControlFailed {
                action: "stop",
                container: self.config.vaultwarden.container_name.clone(),
            });
        }

        if target.exists() && !assume_yes {
            let prompt = format!(
                "WARNING: Target data directory '{}' exists.\n\
                 This operation will DELETE IT and replace it with the contents of the backup.\n\
                 Proceed? (y/N): ",
                target.display()
            );
            if !self.confirm.confirm(&prompt) {
                tracing::warn!("Restore aborted by user");
                if !self.service.start().await {
                    tracing::error!("Failed to restart vaultwarden container after aborted restore");
                }
                self.cleanup_staging(&staging);
                return Ok(RestoreOutcome::Aborted);
            }
            tracing::info!("User confirmed deletion of existing data");
        } else if target.exists() {
            tracing::warn!(
                "Target data directory '{}' exists. Deleting due to --yes flag.",
                target.display()
            );
        }

        if let Err(e) = self.replace_data(&target, &parent, &archive_path) {
            tracing::error!("Restore failed: {}", e);
            tracing::error!("The vaultwarden data directory may be in an inconsistent state!");
            if !self.service.start().await {
                tracing::error!("Failed to restart vaultwarden container after restore failure");
            }
            return Err(e);
        }

        if let (Some(uid), Some(gid)) = (
            self.config.backup.restore.owner_uid,
            self.config.backup.restore.owner_gid,
        ) {
            if let Err(e) = set_permissions(&target, uid, gid) {
                tracing::warn!(
                    "Failed to set ownership/permissions on {}: {}",
                    target.display(),
                    e
                );
                tracing::warn!("Vaultwarden might fail to start if permissions are incorrect");
            }
        }

        if !self.service.start().await {
            // Data was already replaced; only the service process is
            // unhealthy. Staging stays for inspection.
            return Err(BackupError::ServiceControlFailed {
                action: "start",
                container: self.config.vaultwarden.container_name.clone(),
            });
        }

        self.cleanup_staging(&staging);
        tracing::info!(
            "--- Vaultwarden restore finished --- duration: {}",
            format_duration(Local::now() - start_time)
        );
        tracing::info!("Please verify vaultwarden functionality");
        Ok(RestoreOutcome::Completed)
    }

    /// The destructive core of restore: replace the target directory with
    /// the extracted archive and verify the extraction actually
    /// reconstituted it.
    fn replace_data(&self, target: &Path, parent: &Path, archive: &Path) -> Result<(), BackupError> {
        if target.exists() {
            tracing::info!("Deleting existing directory: {}", target.display());
            fs::remove_dir_all(target)?;
        }
        self.archiver.extract(archive, parent)?;
        if !target.is_dir() {
            return Err(BackupError::RestoreIntegrityError(format!(
                "extraction did not create the expected directory: {}",
                target.display()
            )));
        }
        Ok(())
    }

    fn cleanup_staging(&self, staging: &Path) {
        if staging.exists() {
            tracing::info!("Cleaning up temporary directory: {}", staging.display());
            if let Err(e) = fs::remove_dir_all(staging) {
                tracing::warn!(
                    "Could not clean up temporary directory {}: {}",
                    staging.display(),
                    e
                );
            }
        }
    }

    /// Run backups forever on the configured interval. The first run
    /// happens immediately; a tick that comes due while a run is still in
    /// progress is skipped, so runs never overlap.
    pub async fn run_scheduler(&self) {
        let interval_minutes = self.config.backup.schedule.interval_minutes;
        tracing::info!("Starting scheduler. Backup interval: {} minutes.", interval_minutes);

        let mut ticker = interval(Duration::from_secs(interval_minutes * 60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.backup().await {
                Ok(path) => tracing::info!("Scheduled backup completed: {}", path.display()),
                Err(e) => tracing::error!("Scheduled backup run failed: {}", e),
            }
            tracing::info!("Waiting for next scheduled run...");
        }
    }
}

/// Recursively chown the restored tree and tighten permissions to 700 for
/// directories and 600 for files. A chmod failure on an individual file is
/// logged and skipped; everything else aborts the fix-up (typically this
/// means the process is not running as root).
fn set_permissions(target: &Path, uid: u32, gid: u32) -> Result<(), BackupError> {
    use std::os::unix::fs::PermissionsExt;

    tracing::info!("Setting ownership of {} to {}:{}", target.display(), uid, gid);
    for entry in WalkDir::new(target) {
        let entry = entry.map_err(|e| {
            BackupError::Io(e.into_io_error().unwrap_or_else(|| io::Error::other("walk failed")))
        })?;
        let path = entry.path();
        std::os::unix::fs::chown(path, Some(uid), Some(gid))?;

        if entry.file_type().is_dir() {
            fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
        } else if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
            tracing::warn!("Could not set permissions on file {}: {}", path.display(), e);
        }
    }
    tracing::info!("Ownership and permissions set successfully");
    Ok(())
}
