use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::constants::{CONTROL_BUFFER_SIZE, CONTROL_READ_TIMEOUT_SECS, CRLF};
use crate::core_control::stream::FtpSocket;
use crate::core_reply::Reply;
use crate::core_tls::TlsUpgrader;
use crate::error::{FtpError, Result};

/// The persistent command connection to the FTP server.
///
/// Sends CRLF-terminated commands and reads replies one `read()` at a time;
/// a full reply is assumed to arrive in a single read (see [`Reply::parse`]).
pub struct ControlChannel {
    socket: FtpSocket,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    read_timeout: Duration,
}

impl ControlChannel {
    /// Opens the control connection and reads the server greeting.
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<(Self, Reply)> {
        let addr = format!("{}:{}", host, port);
        let stream = timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| FtpError::Connection(format!("timed out connecting to {}", addr)))?
            .map_err(|e| FtpError::Connection(format!("failed to connect to {}: {}", addr, e)))?;

        let local_addr = stream
            .local_addr()
            .map_err(|e| FtpError::Connection(format!("no local address: {}", e)))?;
        let peer_addr = stream
            .peer_addr()
            .map_err(|e| FtpError::Connection(format!("no peer address: {}", e)))?;

        let mut channel = Self {
            socket: FtpSocket::Plain(stream),
            local_addr,
            peer_addr,
            read_timeout: Duration::from_secs(CONTROL_READ_TIMEOUT_SECS),
        };
        let greeting = channel.recv_reply().await?;
        info!("Connected to {}: {}", addr, greeting);
        Ok((channel, greeting))
    }

    /// Writes a command, appending CRLF if the caller left it off.
    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        let line = if command.ends_with(CRLF) {
            command.to_string()
        } else {
            format!("{}{}", command, CRLF)
        };
        debug!("--> {}", line.trim_end());
        self.socket
            .write_all(line.as_bytes())
            .await
            .map_err(|e| FtpError::Connection(format!("failed to send command: {}", e)))?;
        Ok(())
    }

    /// Overrides the per-reply read timeout.
    pub fn set_read_timeout(&mut self, read_timeout: Duration) {
        self.read_timeout = read_timeout;
    }

    /// Reads one reply with a single read into a fixed buffer, bounded by the
    /// read timeout.
    ///
    /// No multi-buffer reassembly: if the server splits a reply across reads
    /// or sends a multi-line reply, only the first line of the first read is
    /// parsed. This matches the simplified protocol use throughout.
    pub async fn recv_reply(&mut self) -> Result<Reply> {
        let mut buffer = vec![0u8; CONTROL_BUFFER_SIZE];
        let n = timeout(self.read_timeout, self.socket.read(&mut buffer))
            .await
            .map_err(|_| {
                FtpError::Connection(format!(
                    "timed out after {:?} waiting for a reply from {}",
                    self.read_timeout, self.peer_addr
                ))
            })?
            .map_err(|e| FtpError::Connection(format!("failed to read reply: {}", e)))?;
        if n == 0 {
            return Err(FtpError::Connection(
                "server closed the control connection".to_string(),
            ));
        }
        let raw = String::from_utf8_lossy(&buffer[..n]).to_string();
        let reply = Reply::parse(&raw)?;
        debug!("<-- {}", reply);
        Ok(reply)
    }

    /// Sends a command and reads the reply to it.
    pub async fn command(&mut self, command: &str) -> Result<Reply> {
        self.send_command(command).await?;
        self.recv_reply().await
    }

    /// Performs the TLS client handshake over the existing socket.
    ///
    /// Only valid while the channel is still plaintext, i.e. right after a
    /// 234 reply to `AUTH TLS`.
    pub async fn into_tls(self, upgrader: &TlsUpgrader) -> Result<Self> {
        let stream = match self.socket {
            FtpSocket::Plain(stream) => stream,
            FtpSocket::Tls(_) => {
                return Err(FtpError::Protocol(
                    "control channel is already TLS-wrapped".to_string(),
                ))
            }
        };
        let tls_stream = upgrader.handshake(stream).await?;
        info!("Control channel upgraded to TLS");
        Ok(Self {
            socket: FtpSocket::Tls(Box::new(tls_stream)),
            local_addr: self.local_addr,
            peer_addr: self.peer_addr,
            read_timeout: self.read_timeout,
        })
    }

    pub fn is_tls(&self) -> bool {
        self.socket.is_tls()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn a_silent_server_times_out_instead_of_hanging() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"220 ready\r\n").await.unwrap();
            // Never reply again; hold the socket open.
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });

        let (mut channel, greeting) =
            ControlChannel::connect("127.0.0.1", port, Duration::from_secs(5))
                .await
                .unwrap();
        assert_eq!(greeting.code, 220);

        channel.set_read_timeout(Duration::from_millis(100));
        let err = channel.command("NOOP").await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "got: {}", err);
    }
}
