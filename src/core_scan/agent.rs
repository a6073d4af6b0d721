use std::path::{Path, PathBuf};

use log::{error, info};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpSocket;
use tokio::process::Command;

use chrono::Local;

use crate::config::ScanConfig;
use crate::constants::{CONTROL_BUFFER_SIZE, SCAN_AGENT_BACKLOG, SCAN_HEADER_SEPARATOR, TRANSFER_CHUNK_SIZE};
use crate::error::{FtpError, Result};

/// Operator-facing console line with a timestamp. The agent prints these for
/// its banner and verdicts regardless of the log filter.
fn log_message(message: &str) {
    println!("[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
}

/// Parses the request header `<filePath><SEPARATOR><fileSizeBytes>`.
pub fn parse_scan_header(raw: &str) -> Result<(String, u64)> {
    let (name, size) = raw
        .split_once(SCAN_HEADER_SEPARATOR)
        .ok_or_else(|| FtpError::ScanAgent("scan header is missing the separator".to_string()))?;
    let size: u64 = size
        .trim()
        .parse()
        .map_err(|_| FtpError::ScanAgent(format!("unparsable file size: {:?}", size)))?;
    Ok((name.to_string(), size))
}

/// Reduces a client-supplied file name to its base component so the scratch
/// file can never escape the scratch directory.
pub fn sanitize_filename(name: &str) -> Result<String> {
    match Path::new(name).file_name() {
        Some(base) => Ok(base.to_string_lossy().to_string()),
        None => Err(FtpError::ScanAgent(format!(
            "file name has no base component: {:?}",
            name
        ))),
    }
}

/// Runs the external scanner and maps its exit status to a verdict string.
/// Exit 0 is clean, 1 is infected, anything else (including a missing
/// scanner binary) is an error.
pub async fn run_scanner(command: &str, path: &Path) -> &'static str {
    let output = Command::new(command)
        .arg("--no-summary")
        .arg("--infected")
        .arg(path)
        .output()
        .await;
    match output {
        Ok(output) => match output.status.code() {
            Some(0) => "CLEAN",
            Some(1) => "INFECTED",
            _ => "ERROR",
        },
        Err(e) => {
            error!("Cannot run scanner {:?}: {}", command, e);
            "ERROR"
        }
    }
}

/// Serves one scan request on an accepted connection.
///
/// Reads the header in a single read (the client sends it as one separate
/// send), receives up to the declared number of bytes into a scratch file,
/// scans it, replies with the verdict, and always deletes the scratch file.
pub async fn handle_client<S>(stream: &mut S, scratch_dir: &Path, scanner_command: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header = vec![0u8; CONTROL_BUFFER_SIZE];
    let n = stream
        .read(&mut header)
        .await
        .map_err(|e| FtpError::ScanAgent(format!("failed to read scan header: {}", e)))?;
    if n == 0 {
        return Err(FtpError::ScanAgent(
            "client closed before sending a header".to_string(),
        ));
    }

    let raw = String::from_utf8_lossy(&header[..n]).to_string();
    let (name, size) = parse_scan_header(&raw)?;
    let name = sanitize_filename(&name)?;
    let scratch_path = scratch_dir.join(&name);
    info!("Receiving {} ({} bytes) for scanning", name, size);

    let result = receive_and_scan(stream, &scratch_path, size, scanner_command).await;

    // The scratch file is deleted no matter how the request ended.
    let _ = tokio::fs::remove_file(&scratch_path).await;
    result
}

async fn receive_and_scan<S>(
    stream: &mut S,
    scratch_path: &Path,
    size: u64,
    scanner_command: &str,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut file = tokio::fs::File::create(scratch_path).await.map_err(|e| {
        FtpError::FileSystem(format!("cannot create {}: {}", scratch_path.display(), e))
    })?;

    let mut received: u64 = 0;
    let mut buffer = vec![0u8; TRANSFER_CHUNK_SIZE];
    while received < size {
        let n = stream
            .read(&mut buffer)
            .await
            .map_err(|e| FtpError::ScanAgent(format!("failed to receive file data: {}", e)))?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])
            .await
            .map_err(|e| FtpError::FileSystem(format!("failed to write scratch file: {}", e)))?;
        received += n as u64;
    }
    file.flush()
        .await
        .map_err(|e| FtpError::FileSystem(format!("failed to flush scratch file: {}", e)))?;
    drop(file);

    let verdict = run_scanner(scanner_command, scratch_path).await;
    log_message(&format!("Scanning result: {}", verdict));

    stream
        .write_all(verdict.as_bytes())
        .await
        .map_err(|e| FtpError::ScanAgent(format!("failed to send verdict: {}", e)))?;
    Ok(())
}

/// Runs the scan agent service.
///
/// Binds the loopback endpoint with a small backlog and serves connections
/// one at a time: a single connection by default, or forever when the config
/// says so. Per-connection errors are logged and never stop the loop.
pub async fn run(config: &ScanConfig) -> Result<()> {
    let scratch_dir = PathBuf::from(&config.scratch_dir);
    tokio::fs::create_dir_all(&scratch_dir).await.map_err(|e| {
        FtpError::FileSystem(format!(
            "cannot create scratch dir {}: {}",
            scratch_dir.display(),
            e
        ))
    })?;

    let addr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| FtpError::ScanAgent(format!("invalid agent address: {}", e)))?;
    let socket = TcpSocket::new_v4()
        .map_err(|e| FtpError::ScanAgent(format!("cannot create socket: {}", e)))?;
    socket
        .set_reuseaddr(true)
        .map_err(|e| FtpError::ScanAgent(format!("cannot set SO_REUSEADDR: {}", e)))?;
    socket
        .bind(addr)
        .map_err(|e| FtpError::ScanAgent(format!("cannot bind {}: {}", addr, e)))?;
    let listener = socket
        .listen(SCAN_AGENT_BACKLOG)
        .map_err(|e| FtpError::ScanAgent(format!("cannot listen on {}: {}", addr, e)))?;

    log_message(&format!(
        "Scan agent is listening at {}:{}",
        config.host, config.port
    ));

    loop {
        let (mut stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) if config.loop_forever => {
                error!("Accept failed: {}", e);
                continue;
            }
            Err(e) => return Err(FtpError::ScanAgent(format!("accept failed: {}", e))),
        };
        info!("Scan connection from {}", peer);

        if let Err(e) = handle_client(&mut stream, &scratch_dir, &config.scanner_command).await {
            error!("Scan request failed: {}", e);
        }
        // Both sockets close here: the stream is dropped each iteration and
        // the listener is dropped on return.
        if !config.loop_forever {
            return Ok(());
        }
    }
}
