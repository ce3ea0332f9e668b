pub mod archive;
pub mod config;
pub mod docker;
pub mod error;
pub mod manager;
pub mod retention;
pub mod store;

pub use archive::{ArchiveGateway, Archiver};
pub use config::Config;
pub use docker::{DockerLifecycle, ServiceLifecycle};
pub use error::BackupError;
pub use manager::{BackupManager, ConfirmationProvider, RestoreOutcome, TerminalConfirmation};
pub use retention::{classify, RetentionDecision, RetentionPolicy};
pub use store::{BackupArtifact, BackupStore};
