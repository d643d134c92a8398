//! Configuration loading: a JSON file on disk, overridable by environment
//! variables and then by CLI flags (highest precedence wins), matching
//! the design's "configuration loading" external collaborator.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid node secret key: {0}")]
    BadSecretKey(String),
}

/// On-disk + env + CLI configuration surface. Node identity is the one
/// field never loaded from the config *file* in plaintext in a real
/// deployment; here it is a hex string for simplicity since seed/key
/// management is an explicit non-goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node_secret_key_hex: String,
    pub network_id: String,
    pub listen_addr: String,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_recovery_interval_ms")]
    pub recovery_interval_ms: u64,
    #[serde(default = "default_completion_timeout_ms")]
    pub completion_timeout_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_recovery_interval_ms() -> u64 {
    300_000
}

fn default_completion_timeout_ms() -> u64 {
    60_000
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Environment variables take precedence over the file; `MESHSWAP_` prefixed,
    /// following the same convention `env_logger` already trains operators
    /// on via `RUST_LOG`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MESHSWAP_LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Ok(v) = std::env::var("MESHSWAP_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Ok(v) = std::env::var("MESHSWAP_NETWORK_ID") {
            self.network_id = v;
        }
    }

    pub fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(addr) = &cli.listen_addr {
            self.listen_addr = addr.clone();
        }
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
        for peer in &cli.connect {
            self.bootstrap_peers.push(peer.clone());
        }
    }

    pub fn node_secret_key(&self) -> Result<SecretKey, ConfigError> {
        let bytes = hex::decode(&self.node_secret_key_hex)
            .map_err(|e| ConfigError::BadSecretKey(e.to_string()))?;
        SecretKey::from_slice(&bytes).map_err(|e| ConfigError::BadSecretKey(e.to_string()))
    }
}

/// CLI flags layered on top of the config file.
#[derive(Debug, Parser)]
#[command(name = "meshswapd", about = "Decentralized limit-order exchange daemon")]
pub struct Cli {
    /// Path to the JSON config file.
    #[arg(short, long, default_value = "meshswap.json")]
    pub config: PathBuf,

    /// Overrides `listen_addr` from the config file.
    #[arg(long)]
    pub listen_addr: Option<String>,

    /// Overrides `log_level` from the config file.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Additional bootstrap peer, `<pubkey-hex>@host:port`; repeatable.
    #[arg(long = "connect")]
    pub connect: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins_over_file_value() {
        let mut config = Config {
            node_secret_key_hex: "11".repeat(32),
            network_id: "mainnet".into(),
            listen_addr: "0.0.0.0:8080".into(),
            bootstrap_peers: Vec::new(),
            log_level: default_log_level(),
            recovery_interval_ms: default_recovery_interval_ms(),
            completion_timeout_ms: default_completion_timeout_ms(),
        };
        std::env::set_var("MESHSWAP_LISTEN_ADDR", "127.0.0.1:9999");
        config.apply_env_overrides();
        std::env::remove_var("MESHSWAP_LISTEN_ADDR");
        assert_eq!(config.listen_addr, "127.0.0.1:9999");
    }

    #[test]
    fn cli_connect_flags_append_to_bootstrap_peers() {
        let mut config = Config {
            node_secret_key_hex: "22".repeat(32),
            network_id: "mainnet".into(),
            listen_addr: "0.0.0.0:8080".into(),
            bootstrap_peers: vec!["existing@host:1".into()],
            log_level: default_log_level(),
            recovery_interval_ms: default_recovery_interval_ms(),
            completion_timeout_ms: default_completion_timeout_ms(),
        };
        let cli = Cli {
            config: PathBuf::from("meshswap.json"),
            listen_addr: None,
            log_level: None,
            connect: vec!["new@host:2".into()],
        };
        config.apply_cli_overrides(&cli);
        assert_eq!(config.bootstrap_peers, vec!["existing@host:1", "new@host:2"]);
    }
}
