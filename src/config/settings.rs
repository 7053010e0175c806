use crate::core::{Difficulty, LedgerSettings, DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD};
use crate::error::{LedgerError, Result};
use crate::network::normalize_peer_addr;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_NODE_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_PEER_TIMEOUT_MS: u64 = 5000;

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const NODE_ID_KEY: &str = "NODE_ID";
const DATA_DIR_KEY: &str = "LEDGER_DATA_DIR";
const DIFFICULTY_KEY: &str = "LEDGER_DIFFICULTY";
const MINING_REWARD_KEY: &str = "LEDGER_MINING_REWARD";
const PEER_TIMEOUT_KEY: &str = "LEDGER_PEER_TIMEOUT_MS";

/// Node configuration. Built once at startup and handed to the ledger and
/// server constructors; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node_addr: String,
    /// Defaults to the port of `node_addr`
    pub node_id: Option<String>,
    pub data_dir: PathBuf,
    /// Leading `0` hex characters a proof hash needs
    pub difficulty: usize,
    pub mining_reward: f64,
    pub peer_timeout_ms: u64,
    /// Registered on startup in addition to the stored peer set
    pub peers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_addr: DEFAULT_NODE_ADDR.to_string(),
            node_id: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            peer_timeout_ms: DEFAULT_PEER_TIMEOUT_MS,
            peers: vec![],
        }
    }
}

impl Config {
    /// Defaults, then the TOML file if one is given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|e| {
                    LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&contents)?
            }
            None => Config::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Config> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies overrides from `lookup`, normally the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            self.node_addr = addr;
        }
        if let Some(node_id) = lookup(NODE_ID_KEY) {
            self.node_id = Some(node_id);
        }
        if let Some(dir) = lookup(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(DIFFICULTY_KEY) {
            self.difficulty = parse_override(DIFFICULTY_KEY, &value)?;
        }
        if let Some(value) = lookup(MINING_REWARD_KEY) {
            self.mining_reward = parse_override(MINING_REWARD_KEY, &value)?;
        }
        if let Some(value) = lookup(PEER_TIMEOUT_KEY) {
            self.peer_timeout_ms = parse_override(PEER_TIMEOUT_KEY, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        normalize_peer_addr(&self.node_addr).map_err(|_| {
            LedgerError::Config(format!("Node address {:?} is not host:port", self.node_addr))
        })?;
        if self.get_node_id().is_empty() {
            return Err(LedgerError::Config("Node id must not be empty".to_string()));
        }
        Difficulty::new(self.difficulty)?;
        if !self.mining_reward.is_finite() || self.mining_reward < 0.0 {
            return Err(LedgerError::Config(format!(
                "Mining reward must be a non-negative number, got {}",
                self.mining_reward
            )));
        }
        if self.peer_timeout_ms == 0 {
            return Err(LedgerError::Config(
                "Peer timeout must be greater than zero".to_string(),
            ));
        }
        for peer in &self.peers {
            normalize_peer_addr(peer)?;
        }
        Ok(())
    }

    /// Explicit node id, or the port of the node address ("127.0.0.1:5000" -> "5000").
    pub fn get_node_id(&self) -> String {
        if let Some(node_id) = &self.node_id {
            return node_id.trim().to_string();
        }
        match self.node_addr.rsplit_once(':') {
            Some((_, port)) => port.to_string(),
            None => "default".to_string(),
        }
    }

    pub fn get_difficulty(&self) -> Result<Difficulty> {
        Difficulty::new(self.difficulty)
    }

    pub fn get_ledger_settings(&self) -> Result<LedgerSettings> {
        Ok(LedgerSettings {
            difficulty: self.get_difficulty()?,
            mining_reward: self.mining_reward,
        })
    }

    pub fn get_peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| LedgerError::Config(format!("{key} has an invalid value: {value:?}")))
}
