//! Configuration management for the ledger node

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ChainError;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Peers registered at startup.
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default = "default_peer_timeout_secs")]
    pub peer_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            bind_address: default_bind_address(),
            bootstrap_peers: Vec::new(),
            peer_timeout_secs: default_peer_timeout_secs(),
        }
    }
}

impl NetworkConfig {
    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MinerConfig {
    /// Recipient of mining rewards. Empty means a random identifier per run.
    #[serde(default)]
    pub node_identifier: String,
}

impl MinerConfig {
    pub fn resolve_node_identifier(&self) -> String {
        if self.node_identifier.trim().is_empty() {
            uuid::Uuid::new_v4().simple().to_string()
        } else {
            self.node_identifier.trim().to_string()
        }
    }
}

fn default_api_port() -> u16 {
    5000
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_peer_timeout_secs() -> u64 {
    10
}

/// Load `config.toml` from the working directory, or defaults when it is absent.
pub fn load_config() -> Result<Config, ChainError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    let config = if path.exists() {
        parse_config(&fs::read_to_string(path)?)?
    } else {
        Config::default()
    };
    validate(&config)?;
    Ok(config)
}

pub fn parse_config(config_str: &str) -> Result<Config, ChainError> {
    let config: Config = toml::from_str(config_str)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ChainError> {
    if config.network.peer_timeout_secs == 0 {
        return Err(ChainError::Config(
            "network.peer_timeout_secs must be greater than zero".to_string(),
        ));
    }
    if config.network.bind_address.trim().is_empty() {
        return Err(ChainError::Config(
            "network.bind_address must be set".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let config = load_config_from("/nonexistent/blockledger/config.toml").unwrap();
        assert_eq!(config.network.api_port, 5000);
        assert_eq!(config.network.bind_address, "0.0.0.0");
        assert!(config.network.bootstrap_peers.is_empty());
        assert_eq!(config.network.peer_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_partial_config() {
        let config = parse_config(
            r#"
            [network]
            api_port = 5001
            bootstrap_peers = ["http://127.0.0.1:5000"]

            [miner]
            node_identifier = "node-a"
            "#,
        )
        .unwrap();

        assert_eq!(config.network.api_port, 5001);
        assert_eq!(config.network.bootstrap_peers, vec!["http://127.0.0.1:5000"]);
        assert_eq!(config.network.peer_timeout_secs, 10);
        assert_eq!(config.miner.resolve_node_identifier(), "node-a");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = parse_config("[network]\npeer_timeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ChainError::Config(_)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = parse_config("[network\napi_port = ").unwrap_err();
        assert!(matches!(err, ChainError::Config(_)));
    }

    #[test]
    fn test_generated_identifier() {
        let miner = MinerConfig::default();
        let id = miner.resolve_node_identifier();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, miner.resolve_node_identifier());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[network]\napi_port = 6000\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.network.api_port, 6000);
    }
}
