//! Types shared by the reconciler and the purger.
//!
//! This module defines the retry schedule, the reconciler's configuration and
//! the settled per-chunk results a reconciliation reports.

use crate::common::errors::{StoreError, StoreResult};
use crate::model::{BulkWriteResponse, MAX_CHUNK_SIZE, OperationKind};
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Retry schedule for unprocessed entries of a chunk.
///
/// There is no delay before the first attempt, `base_delay` before the second,
/// and every later delay doubles the one before it. Without `max_attempts` a
/// chunk is resubmitted until the store applies everything.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use tablekit::bulk_operations::BackoffPolicy;
///
/// let policy = BackoffPolicy::new(Duration::from_millis(50))
///     .with_max_attempts(5)
///     .with_max_delay(Duration::from_millis(150));
///
/// assert_eq!(policy.delay_before(1), Duration::ZERO);
/// assert_eq!(policy.delay_before(2), Duration::from_millis(50));
/// assert_eq!(policy.delay_before(3), Duration::from_millis(100));
/// assert_eq!(policy.delay_before(4), Duration::from_millis(150));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Attempts per chunk before giving up, `None` for no limit
    pub max_attempts: Option<u32>,
    /// Ceiling for a single delay, `None` for no ceiling
    pub max_delay: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY)
    }
}

impl BackoffPolicy {
    /// Unbounded policy with the given base delay
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            max_attempts: None,
            max_delay: None,
        }
    }

    /// Give up after `max_attempts` attempts (at least one attempt is always made)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Delay before attempt number `attempt` (1-based)
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let delay = 2u32
            .checked_pow(attempt - 2)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX);

        match self.max_delay {
            Some(ceiling) => delay.min(ceiling),
            None => delay,
        }
    }

    pub fn allows_attempt(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }
}

/// Configuration for [`BulkReconciler`](super::BulkReconciler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    chunk_size: usize,
    /// Chunks in flight at once, `None` for all of them
    pub max_in_flight_chunks: Option<usize>,
    pub backoff: BackoffPolicy,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            chunk_size: MAX_CHUNK_SIZE,
            max_in_flight_chunks: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ReconcileConfig {
    /// Operations per chunk, clamped to `1..=25`
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    pub fn with_max_in_flight_chunks(mut self, max_in_flight: Option<usize>) -> Self {
        self.max_in_flight_chunks = max_in_flight.map(|n| n.max(1));
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks `operation_count` operations are split into
    pub fn chunk_count(&self, operation_count: usize) -> usize {
        operation_count.div_ceil(self.chunk_size)
    }
}

/// Final state of one chunk.
#[derive(Debug)]
pub struct SettledChunk {
    /// Position of the chunk in the input, starting at 0
    pub chunk_index: usize,
    /// Operations in the chunk's first submission
    pub submitted: usize,
    /// Store calls made for this chunk
    pub attempts: u32,
    /// The converged response, or why the chunk was rejected
    pub outcome: Result<BulkWriteResponse, StoreError>,
}

impl SettledChunk {
    pub fn is_fulfilled(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Result of one reconciliation: one settled outcome per chunk, in chunk order.
///
/// # Examples
///
/// ```no_run
/// use tablekit::bulk_operations::ReconcileReport;
///
/// fn summarize(report: &ReconcileReport) {
///     if report.is_complete_success() {
///         println!("{} operations applied", report.applied_operations());
///     } else {
///         for chunk in report.rejected() {
///             println!("chunk {} failed: {:?}", chunk.chunk_index, chunk.outcome);
///         }
///     }
/// }
/// ```
#[derive(Debug)]
pub struct ReconcileReport {
    pub operation_id: Uuid,
    pub table_name: String,
    pub kind: OperationKind,
    pub chunks: Vec<SettledChunk>,
}

impl ReconcileReport {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn fulfilled(&self) -> impl Iterator<Item = &SettledChunk> {
        self.chunks.iter().filter(|chunk| chunk.is_fulfilled())
    }

    pub fn rejected(&self) -> impl Iterator<Item = &SettledChunk> {
        self.chunks.iter().filter(|chunk| !chunk.is_fulfilled())
    }

    pub fn is_complete_success(&self) -> bool {
        self.chunks.iter().all(SettledChunk::is_fulfilled)
    }

    /// Operations of fulfilled chunks
    pub fn applied_operations(&self) -> usize {
        self.fulfilled().map(|chunk| chunk.submitted).sum()
    }

    /// Store calls across all chunks
    pub fn total_attempts(&self) -> u32 {
        self.chunks.iter().map(|chunk| chunk.attempts).sum()
    }

    /// The report itself if every chunk was fulfilled, otherwise the first
    /// rejection in chunk order
    pub fn into_result(mut self) -> StoreResult<Self> {
        match self.chunks.iter().position(|chunk| !chunk.is_fulfilled()) {
            Some(index) => match self.chunks.swap_remove(index).outcome {
                Err(error) => Err(error),
                Ok(_) => Ok(self),
            },
            None => Ok(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::errors::{BackendError, StoreOperation};

    fn settled(chunk_index: usize, outcome: Result<BulkWriteResponse, StoreError>) -> SettledChunk {
        SettledChunk {
            chunk_index,
            submitted: 25,
            attempts: 1,
            outcome,
        }
    }

    #[test]
    fn default_policy_is_unbounded() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert!(policy.allows_attempt(u32::MAX));
    }

    #[test]
    fn delays_double_after_base() {
        let policy = BackoffPolicy::new(Duration::from_millis(100));
        let delays: Vec<_> = (1..=5).map(|a| policy.delay_before(a)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ]
        );
    }

    #[test]
    fn huge_attempt_numbers_saturate() {
        let policy = BackoffPolicy::new(Duration::from_millis(100));
        assert_eq!(policy.delay_before(200), Duration::MAX);

        let clamped = policy.with_max_delay(Duration::from_secs(5));
        assert_eq!(clamped.delay_before(200), Duration::from_secs(5));
    }

    #[test]
    fn max_attempts_bounds_attempts() {
        let policy = BackoffPolicy::default().with_max_attempts(3);
        assert!(policy.allows_attempt(3));
        assert!(!policy.allows_attempt(4));

        let zero = BackoffPolicy::default().with_max_attempts(0);
        assert_eq!(zero.max_attempts, Some(1));
    }

    #[test]
    fn chunk_size_is_clamped() {
        assert_eq!(ReconcileConfig::default().chunk_size(), 25);
        assert_eq!(ReconcileConfig::default().with_chunk_size(100).chunk_size(), 25);
        assert_eq!(ReconcileConfig::default().with_chunk_size(0).chunk_size(), 1);
        assert_eq!(ReconcileConfig::default().chunk_count(26), 2);
        assert_eq!(ReconcileConfig::default().chunk_count(50), 2);
    }

    #[test]
    fn into_result_surfaces_first_rejection() {
        let report = ReconcileReport {
            operation_id: Uuid::new_v4(),
            table_name: "orders".into(),
            kind: OperationKind::Write,
            chunks: vec![
                settled(0, Ok(BulkWriteResponse::complete())),
                settled(
                    1,
                    Err(StoreError::backend(
                        "orders",
                        StoreOperation::BulkWrite,
                        BackendError::new("InternalServerError", "boom"),
                    )),
                ),
                settled(2, Err(StoreError::Cancelled { operation: StoreOperation::BulkWrite })),
            ],
        };

        assert_eq!(report.chunk_count(), 3);
        assert_eq!(report.fulfilled().count(), 1);
        assert_eq!(report.rejected().count(), 2);
        assert_eq!(report.applied_operations(), 25);
        assert!(!report.is_complete_success());

        let err = report.into_result().unwrap_err();
        assert_eq!(
            err.backend_error().map(|e| e.code.as_str()),
            Some("InternalServerError")
        );
    }
}
