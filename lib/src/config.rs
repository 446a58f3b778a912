//! Node configuration.
//!
//! Loaded from a JSON file (the `--cfg_path` CLI flag, authoritative),
//! with environment variables as a secondary override layer — same
//! priority order the rest of the workspace uses for its own settings,
//! just sourced from a file instead of `.env`.
//!
//! Configuration priority (highest to lowest):
//! 1. Environment variables
//! 2. The JSON config file
//! 3. Hardcoded defaults

use crate::peer::generate_peer_id;
use crate::DEFAULT_DIFFICULTY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

static CONFIG: OnceLock<NodeConfig> = OnceLock::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub chain_db_path: String,
    pub log_db_path: String,
    pub peer_db_path: String,

    pub gateway_address: Option<String>,
    pub gateway_port: Option<u16>,

    pub advertize_addr: String,
    pub listen_port: u16,
    pub advertize_self: bool,

    pub peer_id: String,

    pub peer_sample_size: usize,
    pub poll_delay: u64,

    pub miner_procs: usize,
    pub miner_throttle: f64,

    pub log_level: String,

    #[serde(default = "default_difficulty")]
    pub default_difficulty: u8,
}

fn default_difficulty() -> u8 {
    DEFAULT_DIFFICULTY
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain_db_path: "./data/chain".to_string(),
            log_db_path: "./data/log".to_string(),
            peer_db_path: "./data/peers".to_string(),
            gateway_address: None,
            gateway_port: None,
            advertize_addr: "127.0.0.1".to_string(),
            listen_port: 9000,
            advertize_self: false,
            peer_id: generate_peer_id(),
            peer_sample_size: 3,
            poll_delay: 10,
            miner_procs: 1,
            miner_throttle: 1.0,
            log_level: "INFO".to_string(),
            default_difficulty: DEFAULT_DIFFICULTY,
        }
    }
}

impl NodeConfig {
    /// Load from `path`, falling back field-by-field to defaults for any
    /// key the file omits, then apply environment variable overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let body = std::fs::read_to_string(path)?;
        let mut config: NodeConfig = serde_json::from_str(&body)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_var("CHAIN_DB_PATH") {
            self.chain_db_path = v;
        }
        if let Some(v) = env_var("LOG_DB_PATH") {
            self.log_db_path = v;
        }
        if let Some(v) = env_var("PEER_DB_PATH") {
            self.peer_db_path = v;
        }
        if let Some(v) = env_var("GATEWAY_ADDRESS") {
            self.gateway_address = Some(v);
        }
        if let Some(v) = parse_env("GATEWAY_PORT") {
            self.gateway_port = Some(v);
        }
        if let Some(v) = env_var("ADVERTIZE_ADDR") {
            self.advertize_addr = v;
        }
        if let Some(v) = parse_env("LISTEN_PORT") {
            self.listen_port = v;
        }
        if let Some(v) = parse_env("ADVERTIZE_SELF") {
            self.advertize_self = v;
        }
        if let Some(v) = env_var("PEER_ID") {
            self.peer_id = v;
        }
        if let Some(v) = parse_env("PEER_SAMPLE_SIZE") {
            self.peer_sample_size = v;
        }
        if let Some(v) = parse_env("POLL_DELAY") {
            self.poll_delay = v;
        }
        if let Some(v) = parse_env("MINER_PROCS") {
            self.miner_procs = v;
        }
        if let Some(v) = parse_env("MINER_THROTTLE") {
            self.miner_throttle = v;
        }
        if let Some(v) = env_var("LOG_LEVEL") {
            self.log_level = v;
        }
    }

    /// Write a fresh default config to `path` — the `--initialize` path.
    pub fn initialize<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let config = NodeConfig::default();
        let body = serde_json::to_string_pretty(&config)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, body)?;
        Ok(config)
    }

    pub fn global() -> &'static NodeConfig {
        CONFIG
            .get()
            .expect("NodeConfig::set_global must run before NodeConfig::global")
    }

    pub fn set_global(config: NodeConfig) {
        CONFIG
            .set(config)
            .unwrap_or_else(|_| panic!("NodeConfig::set_global called twice"));
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_default_difficulty() {
        let config = NodeConfig::default();
        assert_eq!(config.default_difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(config.peer_id.len(), 64);
    }

    #[test]
    fn initialize_then_load_round_trips() {
        let path = std::env::temp_dir().join(format!("chainlib-cfg-test-{}.json", std::process::id()));
        let written = NodeConfig::initialize(&path).unwrap();
        let loaded = NodeConfig::load(&path).unwrap();
        assert_eq!(written.chain_db_path, loaded.chain_db_path);
        assert_eq!(written.peer_id, loaded.peer_id);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_field_falls_back_to_serde_default() {
        let path = std::env::temp_dir().join(format!("chainlib-cfg-test-partial-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"chain_db_path":"./c","log_db_path":"./l","peer_db_path":"./p",
               "gateway_address":null,"gateway_port":null,"advertize_addr":"1.2.3.4",
               "listen_port":9001,"advertize_self":false,"peer_id":"abc",
               "peer_sample_size":3,"poll_delay":10,"miner_procs":1,
               "miner_throttle":1.0,"log_level":"INFO"}"#,
        )
        .unwrap();
        let loaded = NodeConfig::load(&path).unwrap();
        assert_eq!(loaded.default_difficulty, DEFAULT_DIFFICULTY);
        std::fs::remove_file(&path).ok();
    }
}
