//! Registry of chain sessions.

use crate::{
    batch::Call,
    config::{AccessConfig, ChainConfig},
    error::{AccessError, ConfigError},
    session::{ChainSession, WriteOptions},
};
use alloy::{
    primitives::{Address, Bytes, TxHash, U256},
    rpc::types::TransactionReceipt,
    signers::local::PrivateKeySigner,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::debug;

/// Process-wide map from logical chain name to [`ChainSession`], created on
/// first use.
///
/// Constructed once by the hosting process and passed by handle to every
/// component that needs chain access, preserving the one-session-per-chain
/// invariant without hidden global state.
#[derive(Debug)]
pub struct SessionRegistry {
    config: AccessConfig,
    sessions: Mutex<HashMap<String, Arc<ChainSession>>>,
}

impl SessionRegistry {
    /// Creates a registry over the given configuration.
    pub fn new(config: AccessConfig) -> Self {
        Self { config, sessions: Mutex::new(HashMap::new()) }
    }

    /// The configuration the registry was built from.
    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// Returns the session for the chain, creating it on first use.
    pub async fn get_or_create(&self, chain: &str) -> Result<Arc<ChainSession>, ConfigError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(chain) {
            return Ok(session.clone());
        }

        let chain_config = self.config.chain(chain)?;
        debug!(%chain, endpoints = chain_config.endpoints.len(), "creating chain session");
        let session =
            Arc::new(ChainSession::new(chain, chain_config, self.config.session.clone())?);
        sessions.insert(chain.to_string(), session.clone());
        Ok(session)
    }

    /// Resolves a chain by the SLIP-44 id used in fee candidate keys.
    pub fn chain_by_slip44(&self, slip44: u64) -> Result<(&str, &ChainConfig), ConfigError> {
        self.config.chain_by_slip44(slip44)
    }

    /// Sends a prepared read call on the chain, with endpoint failover.
    pub async fn send_read(&self, chain: &str, call: &Call) -> Result<Bytes, AccessError> {
        let session = self.get_or_create(chain).await?;
        Ok(session.read_call(call.target, call.data.clone()).await?)
    }

    /// Binds the credential to the chain's session and submits a write.
    pub async fn send_write(
        &self,
        chain: &str,
        credential: PrivateKeySigner,
        target: Address,
        data: Bytes,
        opts: WriteOptions,
    ) -> Result<TxHash, AccessError> {
        let session = self.get_or_create(chain).await?;
        session.set_credential(credential).await;
        Ok(session.write_call(target, data, opts).await?)
    }

    /// Binds the credential to the chain's session and transfers native
    /// value.
    pub async fn send_native(
        &self,
        chain: &str,
        credential: PrivateKeySigner,
        to: Address,
        value: U256,
        opts: WriteOptions,
    ) -> Result<TxHash, AccessError> {
        let session = self.get_or_create(chain).await?;
        session.set_credential(credential).await;
        Ok(session.send_native(to, value, opts).await?)
    }

    /// Waits for the transaction to reach the confirmation depth.
    pub async fn wait_for_receipt(
        &self,
        chain: &str,
        tx_hash: TxHash,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<TransactionReceipt, AccessError> {
        let session = self.get_or_create(chain).await?;
        Ok(session.wait_for_receipt(tx_hash, confirmations, timeout).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResolverConfig, SessionConfig};
    use alloy::primitives::address;

    fn config() -> AccessConfig {
        AccessConfig {
            chains: HashMap::from([(
                "Wanchain".to_string(),
                ChainConfig::new(vec!["http://node0.example:8545".parse().unwrap()], 888, 2153201998),
            )]),
            resolver: ResolverConfig {
                hub_chain: "Wanchain".to_string(),
                fee_schedule: address!("0c0f1e4c4b054739e8800f93e57ab0e318dc1621"),
            },
            session: SessionConfig::default(),
            quote_service: None,
        }
    }

    #[tokio::test]
    async fn sessions_are_created_once() {
        let registry = SessionRegistry::new(config());
        let first = registry.get_or_create("Wanchain").await.unwrap();
        let second = registry.get_or_create("Wanchain").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn unknown_chain_is_a_config_error() {
        let registry = SessionRegistry::new(config());
        assert!(matches!(
            registry.get_or_create("Atlantis").await,
            Err(ConfigError::UnknownChain(_))
        ));
    }
}
