use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// A control or data socket that may or may not have been upgraded to TLS.
///
/// An enum rather than a trait object so the plain `TcpStream` can be taken
/// back out for the `AUTH TLS` handshake.
pub enum FtpSocket {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl FtpSocket {
    pub fn is_tls(&self) -> bool {
        matches!(self, FtpSocket::Tls(_))
    }
}

impl AsyncRead for FtpSocket {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            FtpSocket::Plain(s) => Pin::new(s).poll_read(cx, buf),
            FtpSocket::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for FtpSocket {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            FtpSocket::Plain(s) => Pin::new(s).poll_write(cx, buf),
            FtpSocket::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            FtpSocket::Plain(s) => Pin::new(s).poll_flush(cx),
            FtpSocket::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            FtpSocket::Plain(s) => Pin::new(s).poll_shutdown(cx),
            FtpSocket::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
