/// CLI argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

// Build timestamp injected at compile time
pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");
pub const VERSION_WITH_BUILD: &str =
    concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "vw-backup")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Path to the log file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose (DEBUG) logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single backup now
    Backup,

    /// Restore a backup over the vaultwarden data directory (DESTRUCTIVE)
    Restore {
        /// Timestamp ID (or any unique filename fragment), or 'latest'
        backup_id: String,

        /// Override the vaultwarden host data directory path
        #[arg(long)]
        target_dir: Option<PathBuf>,

        /// Bypass the confirmation prompt (DANGEROUS!)
        #[arg(short, long)]
        yes: bool,
    },

    /// Run an immediate backup, then repeat on the configured interval
    RunScheduler,
}
