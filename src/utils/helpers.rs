/// Helper utilities for vw-backup

use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use chrono::Duration;

/// Run an external command, capturing its output.
///
/// Returns stdout on success; a non-zero exit status is an error carrying
/// the command line and whatever the tool wrote to stderr.
pub fn run_command(program: &str, args: &[&str]) -> Result<String> {
    tracing::debug!("Running command: {} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute '{}'. Is it installed and in PATH?", program))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "Command '{} {}' failed ({}): {}",
            program,
            args.join(" "),
            output.status,
            stderr.trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Human-readable duration for end-of-run summaries, e.g. "1m 23s"
pub fn format_duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Short display name for a path, used in log lines where the full path
/// would be noise
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
