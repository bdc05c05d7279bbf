//! Crossway configuration.

use crate::{
    constants::{
        DEFAULT_CONFIRMATIONS, DEFAULT_CONFIRMATION_TIMEOUT_MS, DEFAULT_ROTATION_DELAY_MS,
    },
    error::ConfigError,
};
use alloy::primitives::Address;
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, time::Duration};
use url::Url;

/// Chain-access configuration, loaded once at process start and read-only to
/// the core afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Per-chain configuration, keyed by logical chain name.
    pub chains: HashMap<String, ChainConfig>,
    /// Fee-resolution configuration.
    pub resolver: ResolverConfig,
    /// Session tuning.
    #[serde(default)]
    pub session: SessionConfig,
    /// Base URL of the bridge quote service, if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_service: Option<Url>,
}

impl AccessConfig {
    /// Adds or replaces a chain.
    pub fn with_chain(mut self, name: impl Into<String>, chain: ChainConfig) -> Self {
        self.chains.insert(name.into(), chain);
        self
    }

    /// Sets the bridge quote service base URL.
    pub fn with_quote_service(mut self, url: Url) -> Self {
        self.quote_service = Some(url);
        self
    }

    /// Sets the session tuning parameters.
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Looks up a chain by logical name.
    pub fn chain(&self, name: &str) -> Result<&ChainConfig, ConfigError> {
        self.chains.get(name).ok_or_else(|| ConfigError::UnknownChain(name.to_string()))
    }

    /// Looks up a chain by its SLIP-44 id, as used in fee candidate keys.
    pub fn chain_by_slip44(&self, slip44: u64) -> Result<(&str, &ChainConfig), ConfigError> {
        self.chains
            .iter()
            .find(|(_, chain)| chain.slip44 == slip44)
            .map(|(name, chain)| (name.as_str(), chain))
            .ok_or(ConfigError::UnknownSlip44(slip44))
    }

    /// Load from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save to a YAML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Static configuration for one logical chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Ordered RPC endpoints; the session starts at the first and rotates on
    /// transport failures.
    pub endpoints: Vec<Url>,
    /// EVM chain id.
    pub chain_id: u64,
    /// SLIP-44 derived chain identifier used in fee candidate keys.
    pub slip44: u64,
    /// Address of the on-chain read aggregator, if deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregator: Option<Address>,
    /// Address of the cross-bridge contract, if deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<Address>,
}

impl ChainConfig {
    /// Creates a chain config over the given endpoints.
    pub fn new(endpoints: Vec<Url>, chain_id: u64, slip44: u64) -> Self {
        Self { endpoints, chain_id, slip44, aggregator: None, bridge: None }
    }

    /// Sets the aggregator contract address.
    pub fn with_aggregator(mut self, aggregator: Address) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    /// Sets the bridge contract address.
    pub fn with_bridge(mut self, bridge: Address) -> Self {
        self.bridge = Some(bridge);
        self
    }
}

/// Fee-resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Logical chain hosting the service-fee schedule contract.
    pub hub_chain: String,
    /// Address of the fee-schedule contract on the hub chain.
    pub fee_schedule: Address,
}

/// Session tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Delay unit between endpoint rotations, in milliseconds. Grows by one
    /// unit per completed wrap of the pool.
    #[serde(default = "default_rotation_delay_ms")]
    pub rotation_delay_ms: u64,
    /// Confirmation depth for submitted transactions.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Timeout for confirmation waits, in milliseconds.
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
}

impl SessionConfig {
    /// Delay unit between endpoint rotations.
    pub fn rotation_delay(&self) -> Duration {
        Duration::from_millis(self.rotation_delay_ms)
    }

    /// Timeout for confirmation waits.
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rotation_delay_ms: default_rotation_delay_ms(),
            confirmations: default_confirmations(),
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
        }
    }
}

fn default_rotation_delay_ms() -> u64 {
    DEFAULT_ROTATION_DELAY_MS
}

fn default_confirmations() -> u64 {
    DEFAULT_CONFIRMATIONS
}

fn default_confirmation_timeout_ms() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_MS
}
