use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::config::ClientConfig;
use crate::constants::{ACTIVE_DATA_PORT, CONTROL_CONNECT_TIMEOUT_SECS, TRANSFER_CHUNK_SIZE};
use crate::core_control::{ControlChannel, FtpSocket};
use crate::core_network::{negotiate, DataMode};
use crate::core_reply::Reply;
use crate::core_scan::{ScanAgentClient, ScanVerdict};
use crate::core_tls::TlsUpgrader;
use crate::core_transfer::engine;
use crate::core_transfer::progress::{LogProgress, ProgressSink};
use crate::core_transfer::walker;
use crate::error::{FtpError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Binary,
}

impl TransferType {
    fn command(&self) -> &'static str {
        match self {
            TransferType::Ascii => "TYPE A",
            TransferType::Binary => "TYPE I",
        }
    }
}

/// One FTP session: one control connection, its TLS context, and the modes
/// that shape the next data-channel negotiation.
///
/// At most one data connection exists at a time; each transfer opens and
/// closes its own. The session is not meant for concurrent use; callers that
/// issue transfers from several tasks must go through the transfer job queue.
pub struct FtpSession {
    host: String,
    port: u16,
    control: Option<ControlChannel>,
    tls: TlsUpgrader,
    tls_active: bool,
    passive: bool,
    transfer_type: TransferType,
    authenticated: bool,
    chunk_size: usize,
    active_data_port: u16,
    connect_timeout: Duration,
    progress: Arc<dyn ProgressSink>,
    scanner: Option<ScanAgentClient>,
}

impl FtpSession {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let tls = TlsUpgrader::new(&config.host)?;
        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            control: None,
            tls,
            tls_active: false,
            passive: config.passive,
            transfer_type: TransferType::Ascii,
            authenticated: false,
            chunk_size: config.chunk_size.unwrap_or(TRANSFER_CHUNK_SIZE),
            active_data_port: config.active_data_port.unwrap_or(ACTIVE_DATA_PORT),
            connect_timeout: Duration::from_secs(
                config.connect_timeout_secs.unwrap_or(CONTROL_CONNECT_TIMEOUT_SECS),
            ),
            progress: Arc::new(LogProgress),
            scanner: None,
        })
    }

    /// Attaches the malware-scanning gate for uploads.
    pub fn with_scanner(mut self, scanner: ScanAgentClient) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn set_passive(&mut self, passive: bool) {
        self.passive = passive;
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Opens the control connection and returns the server greeting.
    pub async fn connect(&mut self) -> Result<Reply> {
        let (channel, greeting) =
            ControlChannel::connect(&self.host, self.port, self.connect_timeout).await?;
        self.control = Some(channel);
        Ok(greeting)
    }

    /// Authenticates: `AUTH TLS` (upgrade on 234), `USER`, `PASS`, then
    /// `PROT P` and binary mode once the 230 for PASS is in.
    ///
    /// Returns true only when the 230 reply was observed.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<bool> {
        let auth_reply = self.control_mut()?.command("AUTH TLS").await?;
        if auth_reply.code == 234 {
            let control = self
                .control
                .take()
                .ok_or_else(|| FtpError::Connection("not connected".to_string()))?;
            self.control = Some(control.into_tls(&self.tls).await?);
            self.tls_active = true;
        } else {
            warn!("Server declined AUTH TLS: {} (continuing plaintext)", auth_reply);
        }

        self.control_mut()?
            .command(&format!("USER {}", username))
            .await?;
        let pass_reply = self
            .control_mut()?
            .command(&format!("PASS {}", password))
            .await?;

        if pass_reply.code != 230 {
            info!("Login refused: {}", pass_reply);
            return Ok(false);
        }

        // Protect the data channels and switch to binary transfers.
        self.control_mut()?.command("PROT P").await?;
        self.set_transfer_type(TransferType::Binary).await?;
        self.authenticated = true;
        Ok(true)
    }

    pub async fn set_transfer_type(&mut self, transfer_type: TransferType) -> Result<Reply> {
        let reply = self.control_mut()?.command(transfer_type.command()).await?;
        if reply.code == 200 {
            self.transfer_type = transfer_type;
        }
        Ok(reply)
    }

    pub async fn cwd(&mut self, dir: &str) -> Result<Reply> {
        let reply = self.control_mut()?.command(&format!("CWD {}", dir)).await?;
        if reply.is_failure() {
            return Err(FtpError::Protocol(format!("CWD {} failed: {}", dir, reply)));
        }
        Ok(reply)
    }

    pub async fn pwd(&mut self) -> Result<Reply> {
        self.control_mut()?.command("PWD").await
    }

    pub async fn mkd(&mut self, dir: &str) -> Result<Reply> {
        let reply = self.control_mut()?.command(&format!("MKD {}", dir)).await?;
        if reply.is_failure() {
            return Err(FtpError::Protocol(format!("MKD {} failed: {}", dir, reply)));
        }
        Ok(reply)
    }

    pub async fn rmd(&mut self, dir: &str) -> Result<Reply> {
        self.control_mut()?.command(&format!("RMD {}", dir)).await
    }

    pub async fn dele(&mut self, name: &str) -> Result<Reply> {
        self.control_mut()?.command(&format!("DELE {}", name)).await
    }

    pub async fn stat(&mut self) -> Result<Reply> {
        self.control_mut()?.command("STAT").await
    }

    /// Renames a remote file: `RNFR` must draw a 350 before `RNTO` is sent.
    pub async fn rename(&mut self, from: &str, to: &str) -> Result<Reply> {
        let rnfr = self.control_mut()?.command(&format!("RNFR {}", from)).await?;
        if rnfr.code != 350 {
            return Err(FtpError::Protocol(format!(
                "RNFR {} not accepted: {}",
                from, rnfr
            )));
        }
        self.control_mut()?.command(&format!("RNTO {}", to)).await
    }

    /// Remote file size via `SIZE`; -1 when the server cannot tell.
    pub async fn size(&mut self, name: &str) -> Result<i64> {
        let reply = self.control_mut()?.command(&format!("SIZE {}", name)).await?;
        if reply.code != 213 {
            return Ok(-1);
        }
        reply
            .text
            .trim()
            .parse::<i64>()
            .map_err(|_| FtpError::Protocol(format!("unparsable SIZE reply: {}", reply)))
    }

    /// Retrieves the directory listing for the current remote directory.
    pub async fn list(&mut self) -> Result<String> {
        let mut data = self.open_data("LIST").await?;
        let listing = engine::read_listing(&mut data, self.chunk_size).await?;
        drop(data);
        let reply = self.control_mut()?.recv_reply().await?;
        info!("LIST finished: {}", reply);
        Ok(listing)
    }

    /// Uploads a local file, gated by the malware scan when one is attached.
    ///
    /// A missing local file short-circuits before any network activity. A
    /// non-Clean verdict surfaces as `SecurityRejection`; a scan that cannot
    /// complete surfaces as `ScanAgent` (either way the upload is refused).
    pub async fn put(&mut self, local: &Path, remote: &str) -> Result<u64> {
        let metadata = tokio::fs::metadata(local).await.map_err(|e| {
            FtpError::FileSystem(format!("cannot stat {}: {}", local.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(FtpError::FileSystem(format!(
                "not a regular file: {}",
                local.display()
            )));
        }

        if let Some(scanner) = &self.scanner {
            match scanner.scan(local).await? {
                ScanVerdict::Clean => {}
                verdict => {
                    return Err(FtpError::SecurityRejection(format!(
                        "{} verdict for {}",
                        verdict,
                        local.display()
                    )))
                }
            }
        }

        let total = metadata.len();
        let mut data = self.open_data(&format!("STOR {}", remote)).await?;
        let mut file = tokio::fs::File::open(local).await.map_err(|e| {
            FtpError::FileSystem(format!("cannot open {}: {}", local.display(), e))
        })?;

        let label = format!("upload {}", remote);
        let sent = engine::copy_chunked(
            &mut file,
            &mut data,
            self.chunk_size,
            Some(total),
            &label,
            self.progress.as_ref(),
        )
        .await?;
        engine::shutdown_data(&mut data).await?;
        drop(data);

        // 226 expected here; logged either way rather than enforced.
        let reply = self.control_mut()?.recv_reply().await?;
        info!("Upload of {} finished ({} bytes): {}", remote, sent, reply);
        Ok(sent)
    }

    /// Downloads a remote file. When `SIZE` fails the progress total is
    /// unknown and reporting degrades to indeterminate.
    pub async fn get(&mut self, remote: &str, local: &Path) -> Result<u64> {
        let expected = self.size(remote).await.unwrap_or(-1);
        let total = if expected >= 0 {
            Some(expected as u64)
        } else {
            None
        };

        let mut data = self.open_data(&format!("RETR {}", remote)).await?;
        let mut file = tokio::fs::File::create(local).await.map_err(|e| {
            FtpError::FileSystem(format!("cannot create {}: {}", local.display(), e))
        })?;

        let label = format!("download {}", remote);
        let received = engine::copy_chunked(
            &mut data,
            &mut file,
            self.chunk_size,
            total,
            &label,
            self.progress.as_ref(),
        )
        .await?;
        drop(data);

        let reply = self.control_mut()?.recv_reply().await?;
        info!(
            "Download of {} finished ({} bytes): {}",
            remote, received, reply
        );
        Ok(received)
    }

    /// Recursively uploads a directory tree. Every file goes through `put`
    /// and therefore through the scan gate.
    pub async fn put_folder(&mut self, local: &Path, remote: &str) -> Result<()> {
        walker::upload_folder(self, local, remote).await
    }

    /// Recursively downloads a directory tree.
    pub async fn get_folder(&mut self, remote: &str, local: &Path) -> Result<()> {
        walker::download_folder(self, remote, local).await
    }

    /// Sends `QUIT` and drops the control connection.
    pub async fn quit(&mut self) -> Result<()> {
        if let Some(control) = self.control.as_mut() {
            match control.command("QUIT").await {
                Ok(reply) => info!("Disconnected: {}", reply),
                Err(e) => warn!("QUIT not acknowledged: {}", e),
            }
        }
        self.control = None;
        self.authenticated = false;
        self.tls_active = false;
        Ok(())
    }

    /// Negotiates the data channel for one transfer and applies the 150 gate.
    ///
    /// Any reply other than 150 after the triggering command closes the data
    /// socket without streaming and fails the operation. On success the
    /// socket is TLS-wrapped (resuming the control channel's session) when
    /// the control channel itself is TLS.
    async fn open_data(&mut self, trigger: &str) -> Result<FtpSocket> {
        let mode = if self.passive {
            DataMode::Passive
        } else {
            DataMode::Active
        };
        let active_port = self.active_data_port;

        let control = self
            .control
            .as_mut()
            .ok_or_else(|| FtpError::Connection("not connected".to_string()))?;
        let raw = negotiate(control, mode, active_port, trigger).await?;
        let reply = control.recv_reply().await?;
        if reply.code != 150 {
            info!("Server declined {}: {}", trigger, reply);
            return Err(FtpError::Transfer(format!(
                "expected 150 after {}, got {}",
                trigger, reply
            )));
        }

        if self.tls_active {
            let tls_stream = self.tls.wrap_data_socket(raw).await?;
            Ok(FtpSocket::Tls(Box::new(tls_stream)))
        } else {
            Ok(FtpSocket::Plain(raw))
        }
    }

    fn control_mut(&mut self) -> Result<&mut ControlChannel> {
        self.control
            .as_mut()
            .ok_or_else(|| FtpError::Connection("not connected".to_string()))
    }
}
