use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::{info, warn};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::error::{FtpError, Result};

/// Single owner of the scan agent child process.
///
/// All spawn/terminate/restart operations go through one mutex, so two
/// transfers can never race a restart. The lock is held across the warm-up
/// sleep on purpose: nobody may talk to a half-started agent.
pub struct AgentSupervisor {
    command: String,
    args: Vec<String>,
    warmup: Duration,
    child: Mutex<Option<Child>>,
    restarts: AtomicU32,
}

impl AgentSupervisor {
    pub fn new(command: impl Into<String>, args: Vec<String>, warmup: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            warmup,
            child: Mutex::new(None),
            restarts: AtomicU32::new(0),
        }
    }

    /// Spawns the agent if it is not already running.
    ///
    /// Readiness is assumed after the fixed warm-up delay; there is no
    /// handshake ping. That timing budget is part of the external contract.
    pub async fn ensure_running(&self) -> Result<()> {
        let mut child = self.child.lock().await;
        let running = match child.as_mut() {
            Some(process) => process
                .try_wait()
                .map_err(|e| FtpError::ScanAgent(format!("cannot poll agent process: {}", e)))?
                .is_none(),
            None => false,
        };
        if running {
            return Ok(());
        }
        *child = Some(self.spawn().await?);
        Ok(())
    }

    /// Terminates the agent (if any) and spawns a fresh one.
    pub async fn restart(&self) -> Result<()> {
        let mut child = self.child.lock().await;
        if let Some(mut process) = child.take() {
            if let Err(e) = process.kill().await {
                warn!("Failed to kill scan agent: {}", e);
            }
        }
        self.restarts.fetch_add(1, Ordering::SeqCst);
        *child = Some(self.spawn().await?);
        Ok(())
    }

    /// Terminates the agent without respawning it.
    pub async fn stop(&self) {
        let mut child = self.child.lock().await;
        if let Some(mut process) = child.take() {
            if let Err(e) = process.kill().await {
                warn!("Failed to kill scan agent: {}", e);
            }
        }
    }

    /// Number of restarts performed since creation.
    pub fn restart_count(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }

    async fn spawn(&self) -> Result<Child> {
        info!("Starting scan agent: {}", self.command);
        let child = Command::new(&self.command)
            .args(&self.args)
            .spawn()
            .map_err(|e| {
                FtpError::ScanAgent(format!("cannot spawn agent {:?}: {}", self.command, e))
            })?;
        tokio::time::sleep(self.warmup).await;
        Ok(child)
    }
}
