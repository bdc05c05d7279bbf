//! Per-chain session with endpoint failover.
//!
//! A [`ChainSession`] hides transient RPC unavailability from callers of read
//! and write operations on one logical chain. Reads rotate through the
//! endpoint pool on transport failures; deterministic contract failures are
//! surfaced immediately since no other endpoint can fix a revert.

use crate::{
    config::{ChainConfig, SessionConfig},
    constants::{FALLBACK_GAS_LIMIT, GAS_BUFFER_PERCENT},
    endpoints::EndpointPool,
    error::{is_transport_failure, ConfigError, SessionError},
    metrics::SessionMetrics,
};
use alloy::{
    eips::eip1559::Eip1559Estimation,
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{DynProvider, PendingTransactionConfig, Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::TransportResult,
};
use std::{collections::HashMap, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

/// Caller-supplied overrides for a write operation. Anything left unset is
/// resolved against the chain before submission.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Native value attached to the transaction.
    pub value: Option<U256>,
    /// Explicit nonce; defaults to the pending transaction count.
    pub nonce: Option<u64>,
    /// Explicit gas limit; defaults to a simulated estimate plus buffer.
    pub gas_limit: Option<u64>,
    /// Legacy gas price. Takes precedence over dynamic fees when set.
    pub gas_price: Option<u128>,
    /// EIP-1559 max fee per gas.
    pub max_fee_per_gas: Option<u128>,
    /// EIP-1559 max priority fee per gas.
    pub max_priority_fee_per_gas: Option<u128>,
}

/// Fee parameters observed on a chain.
#[derive(Debug, Clone, Copy)]
pub enum FeeEstimate {
    /// Dynamic-fee schedule (EIP-1559).
    Dynamic(Eip1559Estimation),
    /// Legacy single gas price.
    Legacy(u128),
}

/// A contract handle bound to one connection.
///
/// Handles are connection-scoped: the session's cache of them is cleared on
/// every endpoint switch so a stale binding is never reused.
#[derive(Debug, Clone)]
struct BoundContract {
    address: Address,
    provider: DynProvider,
}

impl BoundContract {
    async fn call(&self, data: Bytes) -> TransportResult<Bytes> {
        self.provider
            .call(TransactionRequest::default().with_to(self.address).with_input(data))
            .await
    }
}

/// Connection-scoped session state, rebuilt on every endpoint rotation.
#[derive(Debug)]
struct SessionInner {
    pool: EndpointPool,
    provider: DynProvider,
    contracts: HashMap<Address, BoundContract>,
    credential: Option<PrivateKeySigner>,
}

impl SessionInner {
    /// Builds a provider for the endpoint, attaching the signing credential
    /// when one is present.
    fn connect(url: &Url, credential: Option<&PrivateKeySigner>) -> DynProvider {
        match credential {
            Some(signer) => ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer.clone()))
                .connect_http(url.clone())
                .erased(),
            None => ProviderBuilder::new().connect_http(url.clone()).erased(),
        }
    }

    /// Advances to the next endpoint and rebuilds the connection-scoped
    /// state. Returns `(switched, wrapped)`; a single-endpoint pool has
    /// nothing to switch to.
    fn rotate(&mut self) -> (bool, bool) {
        if self.pool.len() == 1 {
            return (false, false);
        }
        let previous = self.pool.current().clone();
        let (url, wrapped) = self.pool.advance();
        let url = url.clone();
        debug!(from = %previous, to = %url, "switching endpoint");
        self.provider = Self::connect(&url, self.credential.as_ref());
        self.contracts.clear();
        (true, wrapped)
    }

    fn contract(&mut self, address: Address) -> &BoundContract {
        let provider = self.provider.clone();
        self.contracts.entry(address).or_insert_with(|| BoundContract { address, provider })
    }
}

/// One session per logical chain, created on demand and reusable for the
/// process lifetime. All connection-scoped state sits behind a single mutex
/// so a rotation triggered by one in-flight call is never observed
/// half-applied by another.
#[derive(Debug)]
pub struct ChainSession {
    name: String,
    chain_id: u64,
    config: SessionConfig,
    inner: Mutex<SessionInner>,
    metrics: SessionMetrics,
}

impl ChainSession {
    /// Creates a session over the chain's endpoint pool, connected to the
    /// first endpoint.
    pub fn new(
        name: impl Into<String>,
        chain: &ChainConfig,
        config: SessionConfig,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if chain.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints(name));
        }
        let pool = EndpointPool::new(chain.endpoints.clone());
        let provider = SessionInner::connect(pool.current(), None);
        Ok(Self {
            name,
            chain_id: chain.chain_id,
            config,
            inner: Mutex::new(SessionInner {
                pool,
                provider,
                contracts: HashMap::new(),
                credential: None,
            }),
            metrics: SessionMetrics::default(),
        })
    }

    /// Logical chain name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// EVM chain id.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The endpoint the session is currently bound to.
    pub async fn current_endpoint(&self) -> Url {
        self.inner.lock().await.pool.current().clone()
    }

    /// Binds a signing credential to the session's current connection.
    ///
    /// The credential is re-attached automatically whenever the connection is
    /// rebuilt on rotation.
    pub async fn set_credential(&self, signer: PrivateKeySigner) {
        let mut inner = self.inner.lock().await;
        inner.credential = Some(signer);
        inner.provider = SessionInner::connect(inner.pool.current(), inner.credential.as_ref());
        inner.contracts.clear();
    }

    /// Address of the bound signing credential, if any.
    pub async fn signer_address(&self) -> Option<Address> {
        self.inner.lock().await.credential.as_ref().map(|signer| signer.address())
    }

    /// Sends a read-only call against the target contract.
    ///
    /// Transport failures rotate to the next endpoint with a delay that grows
    /// by one unit per completed wrap of the pool, up to `2 × endpoint_count`
    /// total attempts. Contract-logic failures are surfaced immediately.
    #[instrument(skip(self, data), fields(chain = %self.name, %target))]
    pub async fn read_call(&self, target: Address, data: Bytes) -> Result<Bytes, SessionError> {
        let mut inner = self.inner.lock().await;
        let max_attempts = 2 * inner.pool.len();
        let mut wraps = 0u32;
        let mut last = None;

        for attempt in 0..max_attempts {
            let contract = inner.contract(target).clone();
            match contract.call(data.clone()).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if is_transport_failure(&err) => {
                    warn!(
                        endpoint = %inner.pool.current(),
                        attempt = attempt + 1,
                        error = %err,
                        "transport failure"
                    );
                    last = Some(err);
                    if attempt + 1 < max_attempts {
                        let (switched, wrapped) = inner.rotate();
                        if wrapped {
                            wraps += 1;
                        }
                        if switched {
                            self.metrics.rotations.increment(1);
                            tokio::time::sleep(self.config.rotation_delay() * (wraps + 1)).await;
                        }
                    }
                }
                Err(err) => {
                    self.metrics.reverted_reads.increment(1);
                    return Err(SessionError::ContractRevert(err.to_string()));
                }
            }
        }

        self.metrics.exhausted_reads.increment(1);
        Err(SessionError::AllEndpointsExhausted {
            attempts: max_attempts,
            last: last.map(|err| err.to_string()).unwrap_or_default(),
        })
    }

    /// Submits a state-changing call against the target contract.
    ///
    /// Requires a signing credential. Nonce, fee parameters and gas limit are
    /// resolved against the chain unless overridden; a failed gas estimate
    /// falls back to [`FALLBACK_GAS_LIMIT`], a failed submission is fatal for
    /// the call.
    #[instrument(skip(self, data, opts), fields(chain = %self.name, %target))]
    pub async fn write_call(
        &self,
        target: Address,
        data: Bytes,
        opts: WriteOptions,
    ) -> Result<TxHash, SessionError> {
        let inner = self.inner.lock().await;
        let from = self.require_signer(&inner)?;

        let mut tx = TransactionRequest::default().with_from(from).with_to(target).with_input(data);
        if let Some(value) = opts.value {
            tx.set_value(value);
        }
        let tx = prepare_write(&inner.provider, from, tx, &opts).await?;

        let pending = inner.provider.send_transaction(tx).await?;
        let hash = *pending.tx_hash();
        self.metrics.submitted.increment(1);
        debug!(%hash, "transaction submitted");
        Ok(hash)
    }

    /// Transfers native value to the recipient.
    #[instrument(skip(self, opts), fields(chain = %self.name, %to))]
    pub async fn send_native(
        &self,
        to: Address,
        value: U256,
        opts: WriteOptions,
    ) -> Result<TxHash, SessionError> {
        let inner = self.inner.lock().await;
        let from = self.require_signer(&inner)?;

        let tx = TransactionRequest::default().with_from(from).with_to(to).with_value(value);
        let tx = prepare_write(&inner.provider, from, tx, &opts).await?;

        let pending = inner.provider.send_transaction(tx).await?;
        let hash = *pending.tx_hash();
        self.metrics.submitted.increment(1);
        debug!(%hash, "native transfer submitted");
        Ok(hash)
    }

    /// Blocks until the transaction reaches the required confirmation depth
    /// or the timeout elapses. An on-chain revert is surfaced distinctly from
    /// a timeout.
    #[instrument(skip(self), fields(chain = %self.name, %tx_hash))]
    pub async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<TransactionReceipt, SessionError> {
        let provider = self.inner.lock().await.provider.clone();

        let watch = PendingTransactionConfig::new(tx_hash)
            .with_required_confirmations(confirmations)
            .with_timeout(Some(timeout));
        if provider.watch_pending_transaction(watch).await?.await.is_err() {
            return Err(SessionError::ConfirmationTimeout(tx_hash));
        }

        let receipt = provider
            .get_transaction_receipt(tx_hash)
            .await?
            .ok_or(SessionError::ConfirmationTimeout(tx_hash))?;
        if !receipt.status() {
            return Err(SessionError::TransactionReverted(tx_hash));
        }
        debug!(block = ?receipt.block_number, "transaction confirmed");
        Ok(receipt)
    }

    /// Native balance of the address.
    pub async fn balance(&self, address: Address) -> Result<U256, SessionError> {
        Ok(self.inner.lock().await.provider.get_balance(address).await?)
    }

    /// Pending transaction count of the address.
    pub async fn nonce(&self, address: Address) -> Result<u64, SessionError> {
        Ok(self.inner.lock().await.provider.get_transaction_count(address).pending().await?)
    }

    /// Current fee parameters of the chain: the dynamic-fee schedule when the
    /// chain supports it, the legacy gas price otherwise.
    pub async fn fee_estimate(&self) -> Result<FeeEstimate, SessionError> {
        let provider = self.inner.lock().await.provider.clone();
        match provider.estimate_eip1559_fees().await {
            Ok(estimate) => Ok(FeeEstimate::Dynamic(estimate)),
            Err(_) => Ok(FeeEstimate::Legacy(provider.get_gas_price().await?)),
        }
    }

    /// Confirmation defaults from the session configuration.
    pub fn defaults(&self) -> &SessionConfig {
        &self.config
    }

    fn require_signer(&self, inner: &SessionInner) -> Result<Address, SessionError> {
        inner
            .credential
            .as_ref()
            .map(|signer| signer.address())
            .ok_or_else(|| SessionError::MissingCredential(self.name.clone()))
    }
}

/// Resolves nonce, fee parameters and gas limit for a write.
async fn prepare_write(
    provider: &DynProvider,
    from: Address,
    mut tx: TransactionRequest,
    opts: &WriteOptions,
) -> Result<TransactionRequest, SessionError> {
    let nonce = match opts.nonce {
        Some(nonce) => nonce,
        None => provider.get_transaction_count(from).pending().await?,
    };
    tx.set_nonce(nonce);

    if let Some(gas_price) = opts.gas_price {
        tx.set_gas_price(gas_price);
    } else if let Some(max_fee) = opts.max_fee_per_gas {
        tx.set_max_fee_per_gas(max_fee);
        tx.set_max_priority_fee_per_gas(opts.max_priority_fee_per_gas.unwrap_or_default());
    } else {
        match provider.estimate_eip1559_fees().await {
            Ok(estimate) => {
                tx.set_max_fee_per_gas(estimate.max_fee_per_gas);
                tx.set_max_priority_fee_per_gas(estimate.max_priority_fee_per_gas);
            }
            Err(err) => {
                debug!(error = %err, "dynamic fees unavailable, using legacy gas price");
                tx.set_gas_price(provider.get_gas_price().await?);
            }
        }
    }

    let gas_limit = match opts.gas_limit {
        Some(gas_limit) => gas_limit,
        None => match provider.estimate_gas(tx.clone()).await {
            Ok(estimate) => estimate + estimate * GAS_BUFFER_PERCENT / 100,
            Err(err) => {
                warn!(error = %err, "gas estimation failed, using fallback limit");
                FALLBACK_GAS_LIMIT
            }
        },
    };
    tx.set_gas_limit(gas_limit);

    Ok(tx)
}
