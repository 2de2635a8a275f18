use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::store::StoreOptions;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub server: ServerConfig,
    /// PostgreSQL connection URL; the in-memory store is used when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,
    pub token: TokenConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenConfig {
    /// HMAC key, at least 32 characters
    pub symmetric_key: String,
    /// Access token lifetime in seconds
    pub access_token_duration: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TransferConfig {
    #[serde(default)]
    pub allow_overdraft: bool,
    /// Upper bound on one transfer transaction; none when absent
    #[serde(default)]
    pub tx_timeout_ms: Option<u64>,
}

fn default_max_connections() -> u32 {
    10
}

impl TransferConfig {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            allow_overdraft: self.allow_overdraft,
            tx_timeout: self.tx_timeout_ms.map(Duration::from_millis),
        }
    }
}

impl TokenConfig {
    pub fn access_token_duration(&self) -> Duration {
        Duration::from_secs(self.access_token_duration)
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
