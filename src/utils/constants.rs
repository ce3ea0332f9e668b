/// Vaultwarden backup naming conventions and defaults
///
/// The artifact filename is the wire format shared with any operator tooling
/// that inspects the destination directory; changing it breaks lookup of
/// previously-created backups.

/// Fixed prefix of every backup artifact filename
pub const ARTIFACT_PREFIX: &str = "vaultwarden-data-";

/// Timestamp portion of the artifact filename (second precision)
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Compressed archive suffix
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Suffix marking an encrypted artifact. Its presence on the filename, not
/// the configuration's encryption flag, decides whether restore decrypts.
pub const ENCRYPTED_SUFFIX: &str = ".gpg";

/// Destination type with full support; anything else degrades to
/// "not supported" at the point of use
pub const LOCAL_DESTINATION: &str = "local";

/// Default log file when --log-file is not given
pub const DEFAULT_LOG_FILE: &str = "vw-backup.log";
