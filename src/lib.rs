pub mod config;
pub mod constants;
pub mod core_cli;
pub mod core_control;
pub mod core_network;
pub mod core_queue;
pub mod core_reply;
pub mod core_scan;
pub mod core_tls;
pub mod core_transfer;
pub mod error;
pub mod session;

pub use config::Config;
pub use error::{FtpError, Result};
pub use session::FtpSession;
