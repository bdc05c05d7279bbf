//! Crossway constants.

/// Percentage buffer added on top of simulated gas estimates before a write is
/// submitted.
pub const GAS_BUFFER_PERCENT: u64 = 20;

/// Gas limit used when gas estimation itself fails.
///
/// Estimation failures are non-fatal for a write; the submission proceeds with
/// this ceiling and the node rejects it if it is genuinely insufficient.
pub const FALLBACK_GAS_LIMIT: u64 = 500_000;

/// Lower bound on the per-group size of an aggregate call.
///
/// Batches never degenerate below this, no matter how many calls are queued.
pub const BATCH_SIZE_FLOOR: usize = 20;

/// Response-size budget used to shrink group size as the total call count
/// grows: the effective group size is `BATCH_SIZE_BUDGET / total_calls`,
/// clamped to [`BATCH_SIZE_FLOOR`].
pub const BATCH_SIZE_BUDGET: usize = 10_000;

/// Base group size for retry attempts; attempt `i` (0-based) retries with
/// `RETRY_SIZE_BASE / (i + 1)`, clamped to [`BATCH_SIZE_FLOOR`].
pub const RETRY_SIZE_BASE: usize = 200;

/// Default upper bound on the per-group size of an aggregate call.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Default number of attempts for a retried batch.
pub const DEFAULT_BATCH_RETRIES: usize = 3;

/// Delay unit between batch retry attempts, in milliseconds. Attempt `i`
/// (0-based) sleeps `i + 1` units before the next attempt.
pub const BATCH_RETRY_DELAY_MS: u64 = 2_000;

/// Default delay unit between endpoint rotations, in milliseconds. The delay
/// grows by one unit for every completed wrap of the endpoint pool.
pub const DEFAULT_ROTATION_DELAY_MS: u64 = 1_000;

/// Default confirmation depth for submitted transactions.
pub const DEFAULT_CONFIRMATIONS: u64 = 1;

/// Default timeout for confirmation waits, in milliseconds.
pub const DEFAULT_CONFIRMATION_TIMEOUT_MS: u64 = 120_000;
