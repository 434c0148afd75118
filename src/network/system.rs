//! Privileged system operations
//!
//! Each operation is pass/fail; their output is logged, never interpreted.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::config::NetworkConfig;
use crate::error::{Result, TrackerError};

/// OS operations the link bring-up depends on
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SystemControl: Send + Sync {
    /// Stop the service that would otherwise hold the modem
    async fn stop_conflicting_service(&self) -> Result<()>;

    /// Raise the cellular data link
    async fn raise_link(&self) -> Result<()>;

    /// Restart the tunnel service once the internet is reachable
    async fn restart_tunnel(&self) -> Result<()>;
}

/// [`SystemControl`] backed by `systemctl` and the configured link script
#[derive(Debug, Clone)]
pub struct SystemCommands {
    use_sudo: bool,
    conflicting_service: String,
    link_command: Vec<String>,
    tunnel_service: String,
}

impl SystemCommands {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            use_sudo: config.use_sudo,
            conflicting_service: config.conflicting_service.clone(),
            link_command: config.link_command.clone(),
            tunnel_service: config.tunnel_service.clone(),
        }
    }

    /// Full argv for a command, prefixed with sudo when configured
    fn argv(&self, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        if self.use_sudo {
            argv.push("sudo".to_string());
        }
        argv.extend(args.iter().map(|a| a.to_string()));
        argv
    }

    async fn run(&self, argv: &[String]) -> Result<()> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| TrackerError::Command("empty command".to_string()))?;

        debug!("Running {}", argv.join(" "));
        let status = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| TrackerError::Command(format!("{}: {}", argv.join(" "), e)))?;

        if !status.success() {
            return Err(TrackerError::Command(format!("{}: {}", argv.join(" "), status)));
        }
        Ok(())
    }
}

#[async_trait]
impl SystemControl for SystemCommands {
    async fn stop_conflicting_service(&self) -> Result<()> {
        if self.conflicting_service.is_empty() {
            return Ok(());
        }
        info!("Stopping {} service...", self.conflicting_service);
        self.run(&self.argv(&["systemctl", "stop", &self.conflicting_service]))
            .await?;
        info!("{} service stopped successfully", self.conflicting_service);
        Ok(())
    }

    async fn raise_link(&self) -> Result<()> {
        let args: Vec<&str> = self.link_command.iter().map(String::as_str).collect();
        self.run(&self.argv(&args))
            .await
            .map_err(|e| TrackerError::LinkRaise(e.to_string()))?;
        info!("LTE connection started successfully");
        Ok(())
    }

    async fn restart_tunnel(&self) -> Result<()> {
        if self.tunnel_service.is_empty() {
            return Ok(());
        }
        self.run(&self.argv(&["systemctl", "restart", &self.tunnel_service]))
            .await?;
        info!("{} restarted successfully", self.tunnel_service);
        Ok(())
    }
}
