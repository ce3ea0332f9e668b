use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vaultwarden_backup::cli::{Cli, Commands};
use vaultwarden_backup::core::{
    ArchiveGateway, Archiver, BackupManager, Config, DockerLifecycle, RestoreOutcome,
    ServiceLifecycle, TerminalConfirmation,
};
use vaultwarden_backup::utils::{display_name, DEFAULT_LOG_FILE};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = Config::load(&cli.config)?;
    let service = DockerLifecycle::new(
        &config.vaultwarden.container_name,
        config.vaultwarden.skip_start_stop,
    )?;
    if !service.ping().await {
        tracing::warn!("Docker daemon is not responding; service control will likely fail");
    }

    let archiver = Archiver::new(
        config.backup.encryption.enabled,
        config.backup.encryption.gpg_key_id.clone(),
    );
    let manager = BackupManager::new(config, service, archiver, Box::new(TerminalConfirmation));

    match cli.command {
        Commands::Backup => handle_backup(&manager).await?,
        Commands::Restore { backup_id, target_dir, yes } => {
            handle_restore(&manager, &backup_id, target_dir, yes).await?;
        }
        Commands::RunScheduler => manager.run_scheduler().await,
    }

    Ok(())
}

async fn handle_backup<S, A>(manager: &BackupManager<S, A>) -> Result<()>
where
    S: ServiceLifecycle,
    A: ArchiveGateway,
{
    let artifact = manager.backup().await?;
    println!("{} Backup created: {}", "✓".green(), display_name(&artifact));
    Ok(())
}

async fn handle_restore<S, A>(
    manager: &BackupManager<S, A>,
    backup_id: &str,
    target_dir: Option<PathBuf>,
    yes: bool,
) -> Result<()>
where
    S: ServiceLifecycle,
    A: ArchiveGateway,
{
    match manager.restore(backup_id, target_dir, yes).await? {
        RestoreOutcome::Completed => {
            println!("{} Restore completed", "✓".green());
            println!("Please verify Vaultwarden functionality.");
        }
        RestoreOutcome::Aborted => {
            println!("{} Restore aborted. No changes were made.", "✗".yellow());
        }
    }
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
    let file_layer = match open_log_file(&log_path) {
        Ok(file) => Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file))),
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", log_path.display(), e);
            None
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
}

fn open_log_file(path: &PathBuf) -> std::io::Result<std::fs::File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new().append(true).create(true).open(path)
}
