//! Node configuration, loaded from TOML with every field defaulted.

use std::path::Path;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::PeerId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Full node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub bootstrap: BootstrapConfig,
    pub trading: TradingConfig,
    pub generator: GeneratorConfig,
    /// Wait after withdrawing advertisements before shutdown completes
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub ip: String,
    /// Listening port; a random one in `1024..2024` when unset
    pub port: Option<u16>,
    /// Timeout applied to every peer call
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Wait between self-visibility lookups
    pub visibility_interval_ms: u64,
    pub max_visibility_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Poll interval while the network is paused
    pub pause_poll_ms: u64,
}

/// Random order traffic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub enabled: bool,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub price_floor: u64,
    pub price_span: u64,
    /// Decimal places kept on generated prices and amounts
    pub decimals: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            bootstrap: BootstrapConfig::default(),
            trading: TradingConfig::default(),
            generator: GeneratorConfig::default(),
            shutdown_grace_ms: 2_000,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            port: None,
            request_timeout_ms: 10_000,
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            visibility_interval_ms: 10_000,
            max_visibility_attempts: 100,
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self { pause_poll_ms: 100 }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_delay_ms: 1_000,
            max_delay_ms: 10_000,
            price_floor: 10_000,
            price_span: 100,
            decimals: 4,
        }
    }
}

impl NodeConfig {
    /// Load from a TOML file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Node identity from the configured address. Picks (and remembers) a
    /// random port when none is set.
    pub fn node_id(&mut self) -> PeerId {
        let port = *self
            .network
            .port
            .get_or_insert_with(|| rand::thread_rng().gen_range(1024..2024));
        PeerId::from_addr(&self.network.ip, port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.network.request_timeout_ms)
    }

    pub fn visibility_interval(&self) -> Duration {
        Duration::from_millis(self.bootstrap.visibility_interval_ms)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.trading.pause_poll_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
