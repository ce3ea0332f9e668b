/// Error taxonomy for backup, restore and retention operations
///
/// Two propagation regimes apply: errors inside a single atomic step (one
/// file deletion during retention, one chmod during permission fix-up) are
/// logged at the call site and never abort sibling operations; errors that
/// compromise workflow safety always abort and propagate to main, which
/// turns them into a non-zero process exit.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    /// Configuration is rejected at startup; never raised during a run.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Stop or start of the vaultwarden container failed where that is
    /// fatal (restore). During backup a failed stop aborts the run but the
    /// process may keep scheduling further runs.
    #[error("Failed to {action} container '{container}'")]
    ServiceControlFailed { action: &'static str, container: String },

    #[error("Failed to create backup archive: {0}")]
    ArchiveCreateFailed(String),

    #[error("Failed to extract archive {}: {reason}", .archive.display())]
    ArchiveExtractFailed { archive: PathBuf, reason: String },

    #[error("Failed to decrypt {}: {reason}", .archive.display())]
    DecryptFailed { archive: PathBuf, reason: String },

    /// The destination directory cannot be enumerated (e.g. not mounted).
    /// Reported to the caller, not retried.
    #[error("Backup destination unavailable at {}: {reason}", .path.display())]
    StoreUnavailable { path: PathBuf, reason: String },

    /// No artifact matched the searched identifier.
    #[error("Backup '{0}' not found in destination")]
    NotFound(String),

    /// A restore precondition failed before anything was touched.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Extraction did not reconstitute the expected data directory. The
    /// vaultwarden data directory may be absent or inconsistent.
    #[error("Restore integrity check failed: {0}")]
    RestoreIntegrityError(String),

    /// Operation requested against a destination type other than "local".
    #[error("Not supported for destination type '{0}'")]
    NotSupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
