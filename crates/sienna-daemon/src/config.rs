//! Configuration file management.
//!
//! Loaded from `$SIENNA_DATA_DIR/config.toml` (or `~/.sienna/config.toml`);
//! every field has a default so a missing file or a partial file both work.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use sienna_types::{
    DEFAULT_CONFIRMATIONS, DEFAULT_FEE_RATE_PCT, SUBSCRIPTION_PERIOD_SECS,
};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub subscriptions: SubscriptionsConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Data directory. Empty = `$SIENNA_DATA_DIR`, then `~/.sienna`.
    #[serde(default)]
    pub data_dir: String,
}

/// Chain provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC provider URL. Empty = run without a chain; chain-dependent
    /// methods fail closed.
    #[serde(default)]
    pub rpc_url: String,
    /// Platform contract addresses whose events we consume.
    #[serde(default)]
    pub contract_addresses: Vec<String>,
    /// Confirmations required before a transaction is trusted.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Bounded receipt polls while waiting for confirmations.
    #[serde(default = "default_confirmation_attempts")]
    pub confirmation_attempts: u32,
    /// Event poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Backoff ceiling after provider failures, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// First block worth scanning on a fresh database.
    #[serde(default)]
    pub start_block: u64,
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// 64-hex-char token secret. Empty = fresh random secret per process
    /// (sessions die on restart).
    #[serde(default)]
    pub token_secret_hex: String,
}

/// Payment ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Platform fee, percent of gross.
    #[serde(default = "default_fee_rate_pct")]
    pub fee_rate_pct: u64,
}

/// Subscription configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionsConfig {
    /// Subscription period in seconds.
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    /// Lapse sweep interval in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

// Default value functions

fn default_confirmations() -> u64 {
    DEFAULT_CONFIRMATIONS
}

fn default_confirmation_attempts() -> u32 {
    40
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_fee_rate_pct() -> u64 {
    DEFAULT_FEE_RATE_PCT
}

fn default_period_secs() -> u64 {
    SUBSCRIPTION_PERIOD_SECS
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            contract_addresses: Vec::new(),
            confirmations: default_confirmations(),
            confirmation_attempts: default_confirmation_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            start_block: 0,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret_hex: String::new(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fee_rate_pct: default_fee_rate_pct(),
        }
    }
}

impl Default for SubscriptionsConfig {
    fn default() -> Self {
        Self {
            period_secs: default_period_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default location, falling back to
    /// defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::default_data_dir().join("config.toml");
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// `$SIENNA_DATA_DIR`, then `~/.sienna`.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("SIENNA_DATA_DIR") {
            if !dir.is_empty() {
                return PathBuf::from(dir);
            }
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".sienna")
    }

    /// The effective data directory.
    pub fn data_dir(&self) -> PathBuf {
        if self.database.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.database.data_dir)
        }
    }
}
