use thiserror::Error;

/// Error taxonomy for the whole client. Every operation boundary returns one
/// of these; nothing in the protocol path panics on a bad peer.
#[derive(Debug, Error)]
pub enum FtpError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transfer error: {0}")]
    Transfer(String),

    #[error("scan agent error: {0}")]
    ScanAgent(String),

    #[error("filesystem error: {0}")]
    FileSystem(String),

    /// The scan verdict was not Clean. Reported distinctly so a caller can
    /// tell "malware detected" apart from a network problem.
    #[error("upload rejected by malware scan: {0}")]
    SecurityRejection(String),
}

impl FtpError {
    pub fn is_security_rejection(&self) -> bool {
        matches!(self, FtpError::SecurityRejection(_))
    }
}

pub type Result<T> = std::result::Result<T, FtpError>;
