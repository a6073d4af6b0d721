use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::ScanConfig;
use crate::constants::{
    SCAN_HEADER_SEPARATOR, SCAN_RETRY_ATTEMPTS, SCAN_TIMEOUT_BASE_SECS, SCAN_TIMEOUT_SECS_PER_MIB,
    TRANSFER_CHUNK_SIZE,
};
use crate::core_scan::supervisor::AgentSupervisor;
use crate::core_transfer::engine::copy_chunked;
use crate::core_transfer::progress::{LogProgress, ProgressSink};
use crate::error::{FtpError, Result};

/// Outcome of a malware scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanVerdict {
    Clean,
    Infected,
    Error,
}

impl std::fmt::Display for ScanVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScanVerdict::Clean => "CLEAN",
            ScanVerdict::Infected => "INFECTED",
            ScanVerdict::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Maps the agent's textual reply to a verdict. Only the literal `CLEAN`
/// clears a file; anything unrecognized counts as an error (fail-closed).
pub fn map_verdict(raw: &str) -> ScanVerdict {
    match raw.trim() {
        "CLEAN" => ScanVerdict::Clean,
        "INFECTED" => ScanVerdict::Infected,
        _ => ScanVerdict::Error,
    }
}

/// Socket timeout for scanning a file of the given size:
/// 45 seconds plus 4 per MiB.
pub fn scan_timeout_for(file_size: u64) -> Duration {
    let mib = file_size / (1024 * 1024);
    Duration::from_secs(SCAN_TIMEOUT_BASE_SECS + SCAN_TIMEOUT_SECS_PER_MIB * mib)
}

/// Client side of the scan agent wire protocol.
///
/// Sends `<filePath><SEPARATOR><fileSizeBytes>` followed by the raw file
/// bytes, reads a single textual verdict, and retries with an agent restart
/// in between when the socket fails.
pub struct ScanAgentClient {
    addr: String,
    chunk_size: usize,
    supervisor: Option<Arc<AgentSupervisor>>,
    progress: Arc<dyn ProgressSink>,
}

impl ScanAgentClient {
    pub fn new(
        host: &str,
        port: u16,
        supervisor: Option<Arc<AgentSupervisor>>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            addr: format!("{}:{}", host, port),
            chunk_size: TRANSFER_CHUNK_SIZE,
            supervisor,
            progress,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        let supervisor = if config.autostart {
            Some(Arc::new(AgentSupervisor::new(
                config.agent_command.clone(),
                vec![],
                Duration::from_secs(
                    config
                        .warmup_secs
                        .unwrap_or(crate::constants::SCAN_AGENT_WARMUP_SECS),
                ),
            )))
        } else {
            None
        };
        Self::new(&config.host, config.port, supervisor, Arc::new(LogProgress))
    }

    /// Scans a file, restarting the agent between failed attempts.
    ///
    /// Up to 3 attempts total; the agent is restarted after a failure except
    /// when no attempt remains. Any path that does not end in a verdict is an
    /// error, which the upload path treats as not-clean.
    pub async fn scan(&self, path: &Path) -> Result<ScanVerdict> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            FtpError::FileSystem(format!("cannot stat {}: {}", path.display(), e))
        })?;
        let file_size = metadata.len();
        let attempt_timeout = scan_timeout_for(file_size);

        let mut last_error =
            FtpError::ScanAgent("scan never attempted".to_string());

        for attempt in 1..=SCAN_RETRY_ATTEMPTS {
            if let Some(supervisor) = &self.supervisor {
                if let Err(e) = supervisor.ensure_running().await {
                    warn!("Scan attempt {}: agent not startable: {}", attempt, e);
                    last_error = e;
                    continue;
                }
            }

            match timeout(attempt_timeout, self.scan_once(path, file_size)).await {
                Ok(Ok(verdict)) => {
                    info!("Scan verdict for {}: {}", path.display(), verdict);
                    return Ok(verdict);
                }
                Ok(Err(e)) => {
                    warn!("Scan attempt {} failed: {}", attempt, e);
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        "Scan attempt {} timed out after {:?}",
                        attempt, attempt_timeout
                    );
                    last_error = FtpError::ScanAgent(format!(
                        "scan timed out after {:?}",
                        attempt_timeout
                    ));
                }
            }

            // Restart between retries, but not after the final attempt.
            if attempt < SCAN_RETRY_ATTEMPTS {
                if let Some(supervisor) = &self.supervisor {
                    if let Err(e) = supervisor.restart().await {
                        warn!("Agent restart failed: {}", e);
                    }
                }
            }
        }

        Err(last_error)
    }

    async fn scan_once(&self, path: &Path, file_size: u64) -> Result<ScanVerdict> {
        let mut stream = TcpStream::connect(&self.addr).await.map_err(|e| {
            FtpError::ScanAgent(format!("cannot connect to scan agent {}: {}", self.addr, e))
        })?;

        let header = format!(
            "{}{}{}",
            path.display(),
            SCAN_HEADER_SEPARATOR,
            file_size
        );
        stream.write_all(header.as_bytes()).await.map_err(|e| {
            FtpError::ScanAgent(format!("failed to send scan header: {}", e))
        })?;

        let mut file = tokio::fs::File::open(path).await.map_err(|e| {
            FtpError::FileSystem(format!("cannot open {}: {}", path.display(), e))
        })?;
        let label = format!("scan {}", path.display());
        copy_chunked(
            &mut file,
            &mut stream,
            self.chunk_size,
            Some(file_size),
            &label,
            self.progress.as_ref(),
        )
        .await
        .map_err(|e| FtpError::ScanAgent(format!("failed to stream file to agent: {}", e)))?;

        let mut reply = [0u8; 64];
        let n = stream.read(&mut reply).await.map_err(|e| {
            FtpError::ScanAgent(format!("failed to read scan verdict: {}", e))
        })?;
        if n == 0 {
            return Err(FtpError::ScanAgent(
                "agent closed the connection without a verdict".to_string(),
            ));
        }
        Ok(map_verdict(&String::from_utf8_lossy(&reply[..n])))
    }
}
