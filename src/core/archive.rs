/// Archive creation, encryption and extraction
///
/// Pure transformation layer, no policy: turns a directory into a tar.gz
/// (optionally gpg-encrypted for a configured recipient) and back. The
/// orchestrator decides when and where.

use std::ffi::OsString;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::error::BackupError;
use crate::utils::{run_command, ARCHIVE_SUFFIX, ENCRYPTED_SUFFIX};

/// Archive capability, injected into the orchestrator so workflows are
/// testable without touching tar or gpg.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveGateway: Send + Sync {
    /// Create a tar.gz of `source_dir` at `<dest_base>.tar.gz`; when
    /// encryption is enabled the plaintext archive is replaced by
    /// `<dest_base>.tar.gz.gpg`. Returns the final artifact path. Partial
    /// output files are removed on every failure path.
    fn create(&self, source_dir: &Path, dest_base: &Path) -> Result<PathBuf, BackupError>;

    /// Decrypt `source` into `destination`. Returns false without invoking
    /// gpg when `source` does not carry the encryption suffix.
    fn decrypt(&self, source: &Path, destination: &Path) -> Result<bool, BackupError>;

    /// Unpack a tar.gz archive into `dest_dir`.
    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<(), BackupError>;
}

pub struct Archiver {
    encrypt: bool,
    gpg_key_id: Option<String>,
}

impl Archiver {
    pub fn new(encrypt: bool, gpg_key_id: Option<String>) -> Self {
        Self { encrypt, gpg_key_id }
    }

    fn write_tar_gz(source_dir: &Path, archive_path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        // Archive root is the directory's basename so extraction into the
        // target's parent reconstitutes the directory at the target path.
        let base_name = source_dir
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("source directory has no name"))?;

        let file = File::create(archive_path)
            .with_context(|| format!("Failed to create {}", archive_path.display()))?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder
            .append_dir_all(base_name, source_dir)
            .context("Failed to append data directory to archive")?;
        builder
            .into_inner()
            .context("Failed to finish archive")?
            .finish()
            .context("Failed to finish compression")?;
        Ok(())
    }

    fn remove_partial(path: &Path) {
        if path.exists() {
            tracing::debug!("Cleaning up potentially incomplete file: {}", path.display());
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!("Could not remove partial file {}: {}", path.display(), e);
            }
        }
    }
}

impl ArchiveGateway for Archiver {
    fn create(&self, source_dir: &Path, dest_base: &Path) -> Result<PathBuf, BackupError> {
        tracing::info!("Creating backup archive for {}", source_dir.display());

        if !source_dir.is_dir() {
            return Err(BackupError::ArchiveCreateFailed(format!(
                "source data directory not found: {}",
                source_dir.display()
            )));
        }
        if let Some(parent) = dest_base.parent() {
            fs::create_dir_all(parent)?;
        }

        let archive_path = with_suffix(dest_base, ARCHIVE_SUFFIX);
        if let Err(e) = Self::write_tar_gz(source_dir, &archive_path) {
            Self::remove_partial(&archive_path);
            return Err(BackupError::ArchiveCreateFailed(e.to_string()));
        }
        tracing::info!("Archive created: {}", archive_path.display());

        if !self.encrypt {
            return Ok(archive_path);
        }

        let key_id = match self.gpg_key_id.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => {
                Self::remove_partial(&archive_path);
                return Err(BackupError::ArchiveCreateFailed(
                    "GPG key id is required for encryption but is missing".to_string(),
                ));
            }
        };

        let encrypted_path = with_suffix(&archive_path, ENCRYPTED_SUFFIX);
        tracing::info!(
            "Encrypting archive to {} using key {}",
            encrypted_path.display(),
            key_id
        );
        let output_arg = encrypted_path.to_string_lossy().into_owned();
        let input_arg = archive_path.to_string_lossy().into_owned();
        let gpg = run_command(
            "gpg",
            &["--encrypt", "--recipient", key_id, "--output", &output_arg, &input_arg],
        );
        match gpg {
            Ok(_) => {
                tracing::info!("Encryption complete");
                if let Err(e) = fs::remove_file(&archive_path) {
                    tracing::warn!(
                        "Could not remove unencrypted archive {}: {}",
                        archive_path.display(),
                        e
                    );
                }
                Ok(encrypted_path)
            }
            Err(e) => {
                Self::remove_partial(&encrypted_path);
                Self::remove_partial(&archive_path);
                Err(BackupError::ArchiveCreateFailed(e.to_string()))
            }
        }
    }

    fn decrypt(&self, source: &Path, destination: &Path) -> Result<bool, BackupError> {
        let is_encrypted = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(ENCRYPTED_SUFFIX))
            .unwrap_or(false);
        if !is_encrypted {
            tracing::warn!(
                "{} does not end with {}, assuming not encrypted",
                source.display(),
                ENCRYPTED_SUFFIX
            );
            return Ok(false);
        }

        tracing::info!("Decrypting {}", source.display());
        let output_arg = destination.to_string_lossy().into_owned();
        let input_arg = source.to_string_lossy().into_owned();
        run_command("gpg", &["--decrypt", "--output", &output_arg, &input_arg]).map_err(|e| {
            BackupError::DecryptFailed {
                archive: source.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        tracing::info!("Decryption complete: {}", destination.display());
        Ok(true)
    }

    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<(), BackupError> {
        tracing::info!("Extracting {} to {}", archive.display(), dest_dir.display());

        let map_err = |reason: String| BackupError::ArchiveExtractFailed {
            archive: archive.to_path_buf(),
            reason,
        };
        let file = File::open(archive).map_err(|e| map_err(e.to_string()))?;
        let mut unpacker = tar::Archive::new(GzDecoder::new(file));
        unpacker
            .unpack(dest_dir)
            .map_err(|e| map_err(e.to_string()))?;

        tracing::info!("Extraction complete");
        Ok(())
    }
}

/// Append a literal suffix to a path without touching its existing
/// extension components
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}
