//! Chain-access metrics.

use metrics::Counter;
use metrics_derive::Metrics;

/// Metrics for a [`ChainSession`](crate::session::ChainSession).
#[derive(Metrics)]
#[metrics(scope = "session")]
pub struct SessionMetrics {
    /// Number of endpoint rotations.
    pub rotations: Counter,
    /// Number of reads that exhausted every endpoint.
    pub exhausted_reads: Counter,
    /// Number of reads that failed deterministically (contract revert).
    pub reverted_reads: Counter,
    /// Number of submitted transactions.
    pub submitted: Counter,
}

/// Metrics for the [`BatchAggregator`](crate::batch::BatchAggregator).
#[derive(Metrics)]
#[metrics(scope = "batch")]
pub struct BatchMetrics {
    /// Number of aggregate invocations sent.
    pub aggregate_calls: Counter,
    /// Number of failed batch attempts.
    pub failed_attempts: Counter,
    /// Number of batches that exhausted their retry budget.
    pub exhausted: Counter,
}

/// Metrics for the [`FeeResolver`](crate::fees::FeeResolver).
#[derive(Metrics)]
#[metrics(scope = "fees")]
pub struct FeeMetrics {
    /// Number of fee resolutions.
    pub resolutions: Counter,
    /// Number of duplicate candidate keys overwritten by a newer request.
    pub stale_candidates: Counter,
}
