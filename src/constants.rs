// src/constants.rs

pub const CRLF: &str = "\r\n";

/// Single-read buffer for control channel replies.
pub const CONTROL_BUFFER_SIZE: usize = 4096;

/// Fixed chunk size for all data-channel and scan-agent streaming.
pub const TRANSFER_CHUNK_SIZE: usize = 4096;

/// Local listening port used for active (PORT) mode data connections.
pub const ACTIVE_DATA_PORT: u16 = 10806;

pub const CONTROL_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Bound on each control-channel reply read.
pub const CONTROL_READ_TIMEOUT_SECS: u64 = 15;

pub const SCAN_AGENT_HOST: &str = "127.0.0.1";
pub const SCAN_AGENT_PORT: u16 = 15116;
pub const SCAN_AGENT_BACKLOG: u32 = 3;

/// Literal token separating file name and size in the scan request header.
pub const SCAN_HEADER_SEPARATOR: &str = "<SEPARATOR>";

/// Total connection attempts against the scan agent before failing closed.
pub const SCAN_RETRY_ATTEMPTS: u32 = 3;

/// Scan socket timeout is BASE + PER_MIB * file size in MiB.
pub const SCAN_TIMEOUT_BASE_SECS: u64 = 45;
pub const SCAN_TIMEOUT_SECS_PER_MIB: u64 = 4;

/// Fixed warm-up delay after spawning the scan agent process.
pub const SCAN_AGENT_WARMUP_SECS: u64 = 2;

pub const SCAN_SCRATCH_DIR: &str = "scan_temp_dir";
