use serde::{Deserialize, Serialize};

use crate::constants::{
    ACTIVE_DATA_PORT, CONTROL_CONNECT_TIMEOUT_SECS, SCAN_AGENT_HOST, SCAN_AGENT_PORT,
    SCAN_AGENT_WARMUP_SECS, SCAN_SCRATCH_DIR, TRANSFER_CHUNK_SIZE,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub passive: bool,
    pub connect_timeout_secs: Option<u64>, // Optional to allow default value
    pub chunk_size: Option<usize>,         // Optional to allow default value
    pub active_data_port: Option<u16>,     // Optional to allow default value
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    /// When false, uploads skip the malware scan entirely.
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Command used to start the agent process when it is not running.
    pub agent_command: String,
    /// Spawn the agent on demand; when false the agent is assumed external.
    pub autostart: bool,
    pub warmup_secs: Option<u64>,
    /// External scanner invoked by the agent binary.
    pub scanner_command: String,
    pub scratch_dir: String,
    /// Agent accept mode: loop forever, or serve a single connection.
    pub loop_forever: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub client: ClientConfig,
    pub scan: ScanConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 21,
            username: String::new(),
            password: String::new(),
            passive: true,
            connect_timeout_secs: Some(CONTROL_CONNECT_TIMEOUT_SECS),
            chunk_size: Some(TRANSFER_CHUNK_SIZE),
            active_data_port: Some(ACTIVE_DATA_PORT),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: String::from(SCAN_AGENT_HOST),
            port: SCAN_AGENT_PORT,
            agent_command: String::from("scanagent"),
            autostart: true,
            warmup_secs: Some(SCAN_AGENT_WARMUP_SECS),
            scanner_command: String::from("clamscan"),
            scratch_dir: String::from(SCAN_SCRATCH_DIR),
            loop_forever: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        use anyhow::Context;
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))?;

        // Set defaults if not specified
        if config.client.connect_timeout_secs.is_none() {
            config.client.connect_timeout_secs = Some(CONTROL_CONNECT_TIMEOUT_SECS);
        }
        if config.client.chunk_size.is_none() {
            config.client.chunk_size = Some(TRANSFER_CHUNK_SIZE);
        }
        if config.client.active_data_port.is_none() {
            config.client.active_data_port = Some(ACTIVE_DATA_PORT);
        }
        if config.scan.warmup_secs.is_none() {
            config.scan.warmup_secs = Some(SCAN_AGENT_WARMUP_SECS);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = Config::default();
        assert_eq!(config.client.port, 21);
        assert!(config.client.passive);
        assert_eq!(config.client.chunk_size, Some(4096));
        assert_eq!(config.scan.port, 15116);
        assert_eq!(config.scan.scratch_dir, "scan_temp_dir");
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let toml_str = r#"
            [client]
            host = "ftp.example.org"
            port = 2121
            username = "user"
            password = "pass"
            passive = false

            [scan]
            enabled = false
            host = "127.0.0.1"
            port = 15116
            agent_command = "scanagent"
            autostart = false
            scanner_command = "clamscan"
            scratch_dir = "scan_temp_dir"
            loop_forever = false
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.client.host, "ftp.example.org");
        assert!(!config.client.passive);
        assert!(config.client.chunk_size.is_none());
        assert!(!config.scan.enabled);
    }
}
