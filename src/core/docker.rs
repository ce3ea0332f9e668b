/// Vaultwarden container lifecycle control
///
/// Thin wrapper over the Docker daemon: stop and start the configured
/// container, nothing more. Outcomes are explicit booleans so the
/// orchestrator branches on them instead of unwinding; failures are logged
/// here with the container name.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::errors::Error as DockerError;
use bollard::Docker;

/// Start/stop capability for the vault service. Skip mode (configuration
/// flag) turns both calls into successful no-ops, for setups where the
/// container is managed externally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceLifecycle: Send + Sync {
    async fn stop(&self) -> bool;
    async fn start(&self) -> bool;
}

pub struct DockerLifecycle {
    docker: Docker,
    container_name: String,
    skip: bool,
}

impl DockerLifecycle {
    pub fn new(container_name: &str, skip: bool) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker daemon. Is Docker running?")?;
        Ok(Self {
            docker,
            container_name: container_name.to_string(),
            skip,
        })
    }

    /// Check daemon reachability before a run; a dead daemon would
    /// otherwise only surface mid-workflow.
    pub async fn ping(&self) -> bool {
        if self.skip {
            return true;
        }
        self.docker.ping().await.is_ok()
    }

    /// The Docker API answers 304 when the container is already in the
    /// requested state; both workflows treat that as success.
    fn already_in_state(err: &DockerError) -> bool {
        matches!(
            err,
            DockerError::DockerResponseServerError { status_code: 304, .. }
        )
    }
}

#[async_trait]
impl ServiceLifecycle for DockerLifecycle {
    async fn stop(&self) -> bool {
        if self.skip {
            tracing::info!("skip_start_stop is set; not stopping container");
            return true;
        }

        tracing::info!("Stopping vaultwarden container '{}'", self.container_name);
        match self.docker.stop_container(&self.container_name, None).await {
            Ok(()) => {
                tracing::info!("Container '{}' stopped", self.container_name);
                true
            }
            Err(e) if Self::already_in_state(&e) => {
                tracing::info!("Container '{}' was already stopped", self.container_name);
                true
            }
            Err(e) => {
                tracing::error!("Failed to stop container '{}': {}", self.container_name, e);
                false
            }
        }
    }

    async fn start(&self) -> bool {
        if self.skip {
            tracing::info!("skip_start_stop is set; not starting container");
            return true;
        }

        tracing::info!("Starting vaultwarden container '{}'", self.container_name);
        match self
            .docker
            .start_container::<String>(&self.container_name, None)
            .await
        {
            Ok(()) => {
                tracing::info!("Container '{}' started", self.container_name);
                true
            }
            Err(e) if Self::already_in_state(&e) => {
                tracing::info!("Container '{}' was already running", self.container_name);
                true
            }
            Err(e) => {
                tracing::error!("Failed to start container '{}': {}", self.container_name, e);
                false
            }
        }
    }
}
