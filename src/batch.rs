//! Batched reads through on-chain aggregators.
//!
//! Folds many independent read calls into as few aggregate invocations as
//! possible while respecting a response-size budget, and makes the whole
//! batch-of-batches operation retryable as a unit with shrinking group sizes.

use crate::{
    constants::{BATCH_RETRY_DELAY_MS, BATCH_SIZE_BUDGET, BATCH_SIZE_FLOOR, RETRY_SIZE_BASE},
    error::{BatchError, ConfigError},
    metrics::BatchMetrics,
    registry::SessionRegistry,
    types::{AgentFee, IAggregator, IFeeSchedule},
};
use alloy::{
    primitives::{Address, Bytes, U256},
    sol_types::{SolCall, SolValue},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument, warn};

/// A single prepared read-only invocation.
///
/// Ordered within a batch; order is preserved end to end because callers
/// correlate results positionally.
#[derive(Debug, Clone)]
pub struct Call {
    /// Target contract address.
    pub target: Address,
    /// ABI-encoded call data.
    pub data: Bytes,
    /// How to interpret the raw return bytes.
    pub decode: DecodeStrategy,
}

impl Call {
    /// A call whose result is passed through as raw bytes.
    pub fn raw(target: Address, data: Bytes) -> Self {
        Self { target, data, decode: DecodeStrategy::Raw }
    }

    /// A call returning a single `uint256`.
    pub fn scalar(target: Address, data: Bytes) -> Self {
        Self { target, data, decode: DecodeStrategy::Scalar }
    }

    /// A call returning a service-fee 5-tuple.
    pub fn agent_fee(target: Address, data: Bytes) -> Self {
        Self { target, data, decode: DecodeStrategy::AgentFee }
    }
}

/// The expected return shape of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// Raw return bytes, undecoded.
    Raw,
    /// A single `uint256`.
    Scalar,
    /// The service-fee 5-tuple of the fee schedule.
    AgentFee,
}

impl DecodeStrategy {
    /// Decodes raw return bytes into a typed result.
    pub fn decode(&self, data: &Bytes) -> Result<CallOutput, alloy::sol_types::Error> {
        match self {
            Self::Raw => Ok(CallOutput::Raw(data.clone())),
            Self::Scalar => Ok(CallOutput::Scalar(U256::abi_decode(data)?)),
            Self::AgentFee => Ok(CallOutput::AgentFee(
                IFeeSchedule::getCrossChainAgentFeeCall::abi_decode_returns(data)?.into(),
            )),
        }
    }
}

/// The decoded result of one call.
#[derive(Debug, Clone)]
pub enum CallOutput {
    /// Undecoded return bytes.
    Raw(Bytes),
    /// A single `uint256`.
    Scalar(U256),
    /// A decoded service fee.
    AgentFee(AgentFee),
}

impl CallOutput {
    /// The scalar value, if this output is one.
    pub fn as_scalar(&self) -> Option<U256> {
        match self {
            Self::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    /// The decoded service fee, if this output is one.
    pub fn as_agent_fee(&self) -> Option<&AgentFee> {
        match self {
            Self::AgentFee(fee) => Some(fee),
            _ => None,
        }
    }
}

/// The outcome of one batch run.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Block number observed by the first group.
    ///
    /// All groups are assumed to observe a consistent chain head for the
    /// purpose of this tool.
    pub block_number: u64,
    /// Decoded results, in input order.
    pub results: Vec<CallOutput>,
}

impl BatchOutcome {
    fn empty() -> Self {
        Self { block_number: 0, results: Vec::new() }
    }
}

/// Per-group size for a batch: shrinks as the total call count grows so the
/// response stays under the size budget, bounded below so batches never
/// degenerate to one call each.
pub fn effective_batch_size(max_batch_size: usize, total_calls: usize) -> usize {
    max_batch_size.min(BATCH_SIZE_FLOOR.max(BATCH_SIZE_BUDGET / total_calls.max(1)))
}

/// Per-group size for retry attempt `attempt` (0-based): smaller batches are
/// more likely to survive a response that was too large.
pub fn retry_batch_size(attempt: usize) -> usize {
    BATCH_SIZE_FLOOR.max(RETRY_SIZE_BASE / (attempt + 1))
}

/// Decodes one group's aggregate envelope and its per-call results.
///
/// `base_index` is the position of the group's first call in the original
/// input list, used to attribute decode failures.
fn decode_group(
    group: &[Call],
    group_index: usize,
    base_index: usize,
    raw: &Bytes,
) -> Result<(u64, Vec<CallOutput>), BatchError> {
    let envelope = IAggregator::aggregateCall::abi_decode_returns(raw)
        .map_err(|source| BatchError::AggregateDecode { group: group_index, source })?;

    if envelope.returnData.len() != group.len() {
        return Err(BatchError::ResultCount {
            group: group_index,
            expected: group.len(),
            actual: envelope.returnData.len(),
        });
    }

    let mut results = Vec::with_capacity(group.len());
    for (offset, data) in envelope.returnData.iter().enumerate() {
        let decoded = group[offset]
            .decode
            .decode(data)
            .map_err(|source| BatchError::Decode { index: base_index + offset, source })?;
        results.push(decoded);
    }

    Ok((envelope.blockNumber.saturating_to(), results))
}

/// Runs batches of read calls through a chain's aggregator contract.
#[derive(Debug)]
pub struct BatchAggregator {
    registry: Arc<SessionRegistry>,
    metrics: BatchMetrics,
}

impl BatchAggregator {
    /// Creates an aggregator over the registry.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry, metrics: BatchMetrics::default() }
    }

    /// Executes the calls in consecutive, order-preserving groups of at most
    /// `max_batch_size`, one simulated aggregate invocation per group.
    ///
    /// An empty input short-circuits to an empty, zero-block result without
    /// any network call. Failure of any group aborts the whole batch.
    #[instrument(skip(self, calls), fields(calls = calls.len()))]
    pub async fn run_batch(
        &self,
        chain: &str,
        calls: &[Call],
        max_batch_size: usize,
    ) -> Result<BatchOutcome, BatchError> {
        if calls.is_empty() {
            return Ok(BatchOutcome::empty());
        }

        let chain_config = self.registry.config().chain(chain)?;
        let aggregator = chain_config
            .aggregator
            .ok_or_else(|| ConfigError::MissingAggregator(chain.to_string()))?;
        let session = self.registry.get_or_create(chain).await?;

        let group_size = effective_batch_size(max_batch_size, calls.len());
        let mut block_number = 0;
        let mut results = Vec::with_capacity(calls.len());

        for (group_index, group) in calls.chunks(group_size).enumerate() {
            let aggregate = IAggregator::aggregateCall {
                calls: group
                    .iter()
                    .map(|call| IAggregator::Call {
                        target: call.target,
                        callData: call.data.clone(),
                    })
                    .collect(),
            };

            self.metrics.aggregate_calls.increment(1);
            let raw = session
                .read_call(aggregator, aggregate.abi_encode().into())
                .await
                .map_err(|source| BatchError::Group { group: group_index, source })?;

            let (block, decoded) =
                decode_group(group, group_index, group_index * group_size, &raw)?;
            if group_index == 0 {
                block_number = block;
            }
            results.extend(decoded);
        }

        debug!(group_size, block_number, "batch complete");
        Ok(BatchOutcome { block_number, results })
    }

    /// Wraps [`run_batch`](Self::run_batch) in up to `max_retries` attempts,
    /// shrinking the group size on every attempt and backing off in between.
    ///
    /// Configuration errors abort immediately; they cannot heal on retry.
    pub async fn run_batch_with_retry(
        &self,
        chain: &str,
        calls: &[Call],
        max_retries: usize,
    ) -> Result<BatchOutcome, BatchError> {
        if calls.is_empty() {
            return Ok(BatchOutcome::empty());
        }

        let mut last = None;
        for attempt in 0..max_retries {
            match self.run_batch(chain, calls, retry_batch_size(attempt)).await {
                Ok(outcome) => return Ok(outcome),
                Err(err @ BatchError::Config(_)) => return Err(err),
                Err(err) => {
                    self.metrics.failed_attempts.increment(1);
                    warn!(chain, attempt = attempt + 1, error = %err, "batch attempt failed");
                    last = Some(err);
                    if attempt + 1 < max_retries {
                        tokio::time::sleep(Duration::from_millis(
                            BATCH_RETRY_DELAY_MS * (attempt as u64 + 1),
                        ))
                        .await;
                    }
                }
            }
        }

        self.metrics.exhausted.increment(1);
        Err(BatchError::RetriesExhausted {
            attempts: max_retries,
            last: last.map(|err| err.to_string()).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const TARGET: Address = address!("00000000000000000000000000000000000000aa");

    fn scalar_calls(n: usize) -> Vec<Call> {
        (0..n).map(|i| Call::scalar(TARGET, Bytes::from(vec![i as u8]))).collect()
    }

    /// Encodes an aggregate envelope the way the contract returns it.
    fn envelope(block: u64, values: &[u64]) -> Bytes {
        let return_data: Vec<Bytes> =
            values.iter().map(|v| U256::from(*v).abi_encode().into()).collect();
        (U256::from(block), return_data).abi_encode_params().into()
    }

    #[test]
    fn effective_size_shrinks_with_call_count() {
        assert_eq!(effective_batch_size(100, 5), 100);
        assert_eq!(effective_batch_size(100, 200), 50);
        assert_eq!(effective_batch_size(100, 1_000), 20);
        // floor holds even for absurd call counts
        assert_eq!(effective_batch_size(100, 100_000), 20);
        // empty input never divides by zero
        assert_eq!(effective_batch_size(100, 0), 100);
    }

    #[test]
    fn retry_size_shrinks_per_attempt() {
        assert_eq!(retry_batch_size(0), 200);
        assert_eq!(retry_batch_size(1), 100);
        assert_eq!(retry_batch_size(2), 66);
        assert_eq!(retry_batch_size(9), 20);
    }

    #[test]
    fn decode_preserves_order_across_partitions() {
        let calls = scalar_calls(7);
        // partition into groups of 3: [0..3], [3..6], [6..7]
        let groups = [
            envelope(42, &[10, 11, 12]),
            envelope(43, &[13, 14, 15]),
            envelope(44, &[16]),
        ];

        let mut results = Vec::new();
        for (group_index, group) in calls.chunks(3).enumerate() {
            let (_, decoded) =
                decode_group(group, group_index, group_index * 3, &groups[group_index]).unwrap();
            results.extend(decoded);
        }

        let values: Vec<u64> =
            results.iter().map(|out| out.as_scalar().unwrap().to::<u64>()).collect();
        assert_eq!(values, vec![10, 11, 12, 13, 14, 15, 16]);
    }

    #[test]
    fn decode_rejects_wrong_result_count() {
        let calls = scalar_calls(3);
        let short = envelope(1, &[7, 8]);
        assert!(matches!(
            decode_group(&calls, 0, 0, &short),
            Err(BatchError::ResultCount { group: 0, expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn scalar_strategy_decodes_a_word() {
        let data: Bytes = U256::from(1_000_000u64).abi_encode().into();
        let out = DecodeStrategy::Scalar.decode(&data).unwrap();
        assert_eq!(out.as_scalar(), Some(U256::from(1_000_000u64)));
    }

    #[test]
    fn agent_fee_strategy_decodes_the_tuple() {
        let data: Bytes = (
            U256::from(30u64),
            U256::from(10_000u64),
            U256::from(5u64),
            U256::from(1u64),
            U256::from(100u64),
        )
            .abi_encode_params()
            .into();
        let out = DecodeStrategy::AgentFee.decode(&data).unwrap();
        let fee = out.as_agent_fee().unwrap();
        assert_eq!(fee.numerator, U256::from(30u64));
        assert_eq!(fee.denominator, U256::from(10_000u64));
        assert!(fee.is_configured());
    }
}
