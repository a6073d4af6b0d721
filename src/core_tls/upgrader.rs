use std::sync::Arc;
use std::time::SystemTime;

use log::debug;
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, ServerName};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::error::{FtpError, Result};

/// Certificate verifier that accepts any peer certificate.
///
/// Peer verification is disabled as an explicit policy for this client, the
/// same trust-everyone stance the scanning side takes. There is deliberately
/// no configuration knob to turn verification on.
struct TrustAnyCert;

impl ServerCertVerifier for TrustAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

/// Wraps sockets in TLS after `AUTH TLS`.
///
/// One connector (and therefore one in-memory client session cache) serves
/// both the control channel and every data socket, so a data-channel
/// handshake resumes the control channel's TLS session. Many FTPS servers
/// reject data connections that do not resume that session.
pub struct TlsUpgrader {
    connector: TlsConnector,
    server_name: ServerName,
}

impl TlsUpgrader {
    pub fn new(host: &str) -> Result<Self> {
        let server_name = ServerName::try_from(host)
            .map_err(|e| FtpError::Connection(format!("invalid TLS server name {:?}: {}", host, e)))?;

        let config = ClientConfig::builder()
            .with_safe_defaults()
            .with_custom_certificate_verifier(Arc::new(TrustAnyCert))
            .with_no_client_auth();
        // The default in-memory session cache is what carries the control
        // channel's session to the data sockets.
        let connector = TlsConnector::from(Arc::new(config));

        Ok(Self {
            connector,
            server_name,
        })
    }

    /// Client handshake over the control socket.
    pub async fn handshake(&self, stream: TcpStream) -> Result<TlsStream<TcpStream>> {
        self.connector
            .connect(self.server_name.clone(), stream)
            .await
            .map_err(|e| FtpError::Connection(format!("TLS handshake failed: {}", e)))
    }

    /// Wraps a freshly connected data socket, resuming the cached session.
    pub async fn wrap_data_socket(&self, stream: TcpStream) -> Result<TlsStream<TcpStream>> {
        debug!("Wrapping data socket in TLS (session resumption)");
        self.connector
            .connect(self.server_name.clone(), stream)
            .await
            .map_err(|e| FtpError::Connection(format!("data socket TLS handshake failed: {}", e)))
    }
}
