//! Runtime configuration.
//!
//! Defaults are suitable for a local development host. Every field that an
//! operator is likely to change can be overridden from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `HOST_LISTEN_ADDR` | `network.listen_addr` |
//! | `HOST_DATA_DIR` | `storage.data_dir` |
//! | `HOST_TOTAL_STORAGE` | `settings.total_storage` |
//! | `HOST_PRICE` | `settings.price` |
//! | `HOST_BURN` | `settings.burn` |
//! | `HOST_COIN_ADDRESS` | `settings.coin_address` (64 hex chars) |
//! | `HOST_BLOCK_INTERVAL_SECS` | `dev_chain.block_interval_secs` |
//! | `HOST_ANNOUNCE` | `announce.enabled` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use shared_types::{CoinAddress, Currency};
use storage_host::{HostConfig, HostSettings};
use thiserror::Error;
use tracing::warn;

/// Complete runtime configuration.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    /// Terms advertised to renters.
    pub settings: HostSettings,
    /// Host tuning knobs (reorg depth, fees, message limits).
    pub host: HostConfig,
    pub dev_chain: DevChainConfig,
    pub announce: AnnounceConfig,
}

#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub listen_addr: SocketAddr,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9982)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl StorageConfig {
    /// Directory holding contracted file data.
    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }
}

/// In-memory chain used when no consensus node is attached.
#[derive(Clone, Debug)]
pub struct DevChainConfig {
    pub start_height: u64,
    pub block_interval_secs: u64,
    pub wallet_balance: Currency,
}

impl Default for DevChainConfig {
    fn default() -> Self {
        Self {
            start_height: 0,
            block_interval_secs: 10,
            wallet_balance: 1_000_000_000,
        }
    }
}

/// Host announcement made at startup.
#[derive(Clone, Debug)]
pub struct AnnounceConfig {
    pub enabled: bool,
    pub freeze_volume: Currency,
    /// Blocks past the current height until the frozen coins unlock.
    pub freeze_blocks: u64,
    pub miner_fee: Currency,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            freeze_volume: 1_000,
            freeze_blocks: 1_000,
            miner_fee: 10,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let network = NetworkConfig::default();
        Self {
            settings: HostSettings {
                net_address: network.listen_addr.to_string(),
                total_storage: 1 << 30,
                min_filesize: 1,
                max_filesize: 1 << 26,
                min_duration: 10,
                max_duration: 100_000,
                min_challenge_window: 5,
                max_challenge_window: 1_000,
                min_tolerance: 1,
                price: 1,
                burn: 1,
                coin_address: CoinAddress::default(),
            },
            network,
            storage: StorageConfig::default(),
            host: HostConfig::default(),
            dev_chain: DevChainConfig::default(),
            announce: AnnounceConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field}: minimum {min} exceeds maximum {max}")]
    InvertedBounds {
        field: &'static str,
        min: u64,
        max: u64,
    },

    #[error("total storage must be positive, got {0}")]
    NoStorage(i64),

    #[error("{0} must be non-zero")]
    Zero(&'static str),

    #[error("max message size must be at least {0} bytes")]
    MessageLimitTooSmall(u64),
}

impl RuntimeConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides read through `lookup`. Unparseable values are
    /// logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = parsed::<SocketAddr, _>(&lookup, "HOST_LISTEN_ADDR") {
            config.network.listen_addr = addr;
            config.settings.net_address = addr.to_string();
        }
        if let Some(dir) = lookup("HOST_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(total) = parsed(&lookup, "HOST_TOTAL_STORAGE") {
            config.settings.total_storage = total;
        }
        if let Some(price) = parsed(&lookup, "HOST_PRICE") {
            config.settings.price = price;
        }
        if let Some(burn) = parsed(&lookup, "HOST_BURN") {
            config.settings.burn = burn;
        }
        if let Some(raw) = lookup("HOST_COIN_ADDRESS") {
            match parse_coin_address(&raw) {
                Some(address) => config.settings.coin_address = address,
                None => warn!("Invalid HOST_COIN_ADDRESS '{}', using default", raw),
            }
        }
        if let Some(secs) = parsed(&lookup, "HOST_BLOCK_INTERVAL_SECS") {
            config.dev_chain.block_interval_secs = secs;
        }
        if let Some(enabled) = parsed(&lookup, "HOST_ANNOUNCE") {
            config.announce.enabled = enabled;
        }

        config
    }

    /// Reject configurations the host cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.settings;
        if s.total_storage <= 0 {
            return Err(ConfigError::NoStorage(s.total_storage));
        }
        let bounds = [
            ("filesize", s.min_filesize, s.max_filesize),
            ("duration", s.min_duration, s.max_duration),
            (
                "challenge window",
                s.min_challenge_window,
                s.max_challenge_window,
            ),
        ];
        for (field, min, max) in bounds {
            if min > max {
                return Err(ConfigError::InvertedBounds { field, min, max });
            }
        }
        if s.min_challenge_window == 0 {
            return Err(ConfigError::Zero("min challenge window"));
        }
        if self.host.reorg_depth == 0 {
            return Err(ConfigError::Zero("reorg depth"));
        }
        if self.dev_chain.block_interval_secs == 0 {
            return Err(ConfigError::Zero("block interval"));
        }
        // must at least fit a bare proposal
        if self.host.max_message_size < 1024 {
            return Err(ConfigError::MessageLimitTooSmall(1024));
        }
        Ok(())
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Invalid {} '{}', using default", key, raw);
            None
        }
    }
}

fn parse_coin_address(raw: &str) -> Option<CoinAddress> {
    let bytes = hex::decode(raw.trim_start_matches("0x")).ok()?;
    bytes.try_into().ok()
}
