//! Crossway error types.
//!
//! The taxonomy distinguishes failures worth retrying (transport, batch size)
//! from deterministic ones (reverts, configuration): a caller receiving an
//! [`AccessError`] can tell from its kind whether retrying the whole request
//! might help.

use alloy::{
    primitives::TxHash,
    transports::{RpcError, TransportErrorKind},
};
use thiserror::Error;

/// Errors raised by a [`ChainSession`](crate::session::ChainSession).
#[derive(Debug, Error)]
pub enum SessionError {
    /// A deterministic contract failure. Retrying against another endpoint
    /// cannot fix a revert, so the session surfaces it without rotating.
    #[error("contract call reverted: {0}")]
    ContractRevert(String),
    /// Every endpoint in the pool failed with a transport error.
    #[error("all endpoints exhausted after {attempts} attempts: {last}")]
    AllEndpointsExhausted {
        /// Number of attempts made before giving up.
        attempts: usize,
        /// Message of the last underlying transport error.
        last: String,
    },
    /// A write operation was requested without a signing credential.
    #[error("no signing credential set for chain {0}")]
    MissingCredential(String),
    /// The transaction was mined but reverted on-chain.
    #[error("transaction {0} reverted on-chain")]
    TransactionReverted(TxHash),
    /// The confirmation wait elapsed before the transaction reached the
    /// required depth.
    #[error("timed out waiting for transaction {0} to confirm")]
    ConfirmationTimeout(TxHash),
    /// A non-retried RPC failure, e.g. on the submission path.
    #[error(transparent)]
    Rpc(#[from] RpcError<TransportErrorKind>),
    /// A failure registering or awaiting a pending-transaction watch.
    #[error(transparent)]
    PendingTx(#[from] alloy::providers::PendingTransactionError),
}

/// Errors raised by the [`BatchAggregator`](crate::batch::BatchAggregator).
#[derive(Debug, Error)]
pub enum BatchError {
    /// The aggregate invocation for one group failed.
    #[error("aggregate group {group} failed: {source}")]
    Group {
        /// Index of the failed group within the batch.
        group: usize,
        #[source]
        source: SessionError,
    },
    /// The aggregate envelope itself could not be decoded.
    #[error("failed to decode aggregate response for group {group}: {source}")]
    AggregateDecode {
        /// Index of the offending group within the batch.
        group: usize,
        #[source]
        source: alloy::sol_types::Error,
    },
    /// The aggregator returned a result array of the wrong length.
    #[error("aggregate group {group} returned {actual} results, expected {expected}")]
    ResultCount {
        /// Index of the offending group within the batch.
        group: usize,
        expected: usize,
        actual: usize,
    },
    /// Decoding one sub-result failed.
    #[error("failed to decode result for call {index}: {source}")]
    Decode {
        /// Position of the call in the original input list.
        index: usize,
        #[source]
        source: alloy::sol_types::Error,
    },
    /// All retry attempts were exhausted.
    #[error("batch failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made before giving up.
        attempts: usize,
        /// Message of the last underlying error.
        last: String,
    },
    /// The batch could not be constructed from configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration errors. Always fatal, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The logical chain name is not present in configuration.
    #[error("unknown chain {0}")]
    UnknownChain(String),
    /// No configured chain carries the given SLIP-44 id.
    #[error("no chain configured with slip44 id {0}")]
    UnknownSlip44(u64),
    /// The chain has no aggregator contract configured.
    #[error("no aggregator contract configured for chain {0}")]
    MissingAggregator(String),
    /// The chain has no bridge contract configured.
    #[error("no bridge contract configured for chain {0}")]
    MissingBridge(String),
    /// The chain has an empty endpoint list.
    #[error("chain {0} has no endpoints")]
    NoEndpoints(String),
}

/// Errors raised during fee resolution.
#[derive(Debug, Error)]
pub enum FeeError {
    /// A batched lookup failed.
    #[error(transparent)]
    Batch(#[from] BatchError),
    /// The route references unknown configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised by the bridge quote client.
#[derive(Debug, Error)]
pub enum QuoteError {
    /// The HTTP request failed or the response was not valid JSON.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// The quote service returned a non-success status.
    #[error("quote service returned status {0}")]
    Status(reqwest::StatusCode),
}

/// The overarching error type of the chain-access layer.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Errors related to a chain session.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Errors related to batched reads.
    #[error(transparent)]
    Batch(#[from] BatchError),
    /// Errors related to fee resolution.
    #[error(transparent)]
    Fee(#[from] FeeError),
    /// Errors related to configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Errors related to bridge quotes.
    #[error(transparent)]
    Quote(#[from] QuoteError),
}

/// Classifies an RPC failure for the read path.
///
/// JSON-RPC error responses carry deterministic node-side failures (reverts,
/// execution errors) and are surfaced immediately; everything else (connect
/// failures, timeouts, malformed responses) is transient and worth another
/// endpoint.
pub(crate) fn is_transport_failure(err: &RpcError<TransportErrorKind>) -> bool {
    !matches!(err, RpcError::ErrorResp(_))
}
