use super::cancellation::{acquire_permit, run_cancellable, sleep_cancellable};
use super::types::{ReconcileConfig, ReconcileReport, SettledChunk};
use crate::common::errors::{ErrorContext, StoreError, StoreResult};
use crate::common::rate_limiter::RateLimiter;
use crate::logging::StoreLogger;
use crate::model::{BulkWriteResponse, Operation, OperationKind};
use crate::store::StoreClient;
use crate::validation::{validate_operations, validate_table_name};
use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Applies bulk writes or deletes until the store has processed every entry.
///
/// The operations are split into chunks of at most 25. Each chunk is submitted
/// as one bulk request and only its unprocessed remainder is resubmitted,
/// following the configured [`BackoffPolicy`](super::BackoffPolicy). Chunks
/// run concurrently inside the calling task and settle independently: a
/// failing chunk never stops its siblings.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tablekit::bulk_operations::{BulkReconciler, ReconcileConfig};
/// use tablekit::logging::LogFacade;
/// use tablekit::model::{Operation, item_from_json};
/// use tablekit::store::MemoryStore;
///
/// # async fn example() -> Result<(), tablekit::common::StoreError> {
/// let reconciler = BulkReconciler::new(
///     Arc::new(MemoryStore::new()),
///     ReconcileConfig::default(),
///     Arc::new(LogFacade),
/// );
///
/// let item = item_from_json(serde_json::json!({"id": "order-1", "total": 12}))?;
/// let report = reconciler.reconcile("orders", &[Operation::Write(item)]).await?;
/// assert!(report.is_complete_success());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BulkReconciler {
    store: Arc<dyn StoreClient>,
    config: ReconcileConfig,
    logger: Arc<dyn StoreLogger>,
    rate_limiter: Option<RateLimiter>,
}

impl BulkReconciler {
    pub fn new(
        store: Arc<dyn StoreClient>,
        config: ReconcileConfig,
        logger: Arc<dyn StoreLogger>,
    ) -> Self {
        Self {
            store,
            config,
            logger,
            rate_limiter: None,
        }
    }

    /// Wait for a permit from `rate_limiter` before every store call
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &Arc<dyn StoreClient> {
        &self.store
    }

    pub(crate) fn logger(&self) -> &Arc<dyn StoreLogger> {
        &self.logger
    }

    pub(crate) fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.rate_limiter.as_ref()
    }

    /// Reconcile `operations` against `table_name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for an invalid table name or an
    /// empty, mixed-kind or malformed operation list. Failures of individual
    /// chunks are reported in the returned [`ReconcileReport`].
    pub async fn reconcile(
        &self,
        table_name: &str,
        operations: &[Operation],
    ) -> StoreResult<ReconcileReport> {
        self.reconcile_with_cancel(table_name, operations, &CancellationToken::new())
            .await
    }

    /// Like [`reconcile`](Self::reconcile), stopping when `cancel` fires.
    ///
    /// Chunks still waiting for a store call or a backoff delay at that point
    /// settle as [`StoreError::Cancelled`]. Entries already applied stay applied.
    pub async fn reconcile_with_cancel(
        &self,
        table_name: &str,
        operations: &[Operation],
        cancel: &CancellationToken,
    ) -> StoreResult<ReconcileReport> {
        validate_table_name(table_name)?;
        let kind = validate_operations(operations)?;

        let operation_id = Uuid::new_v4();
        let chunk_size = self.config.chunk_size();
        let chunk_count = self.config.chunk_count(operations.len());
        let in_flight = self
            .config
            .max_in_flight_chunks
            .unwrap_or(chunk_count)
            .max(1);

        self.logger.info(&format!(
            "[{operation_id}] Reconciling {} {kind} operations on table '{table_name}' in {chunk_count} chunks",
            operations.len()
        ));

        let chunks: Vec<SettledChunk> = stream::iter(operations.chunks(chunk_size).enumerate())
            .map(|(chunk_index, chunk)| {
                self.settle_chunk(operation_id, table_name, kind, chunk_index, chunk, cancel)
            })
            .buffered(in_flight)
            .collect()
            .await;

        let report = ReconcileReport {
            operation_id,
            table_name: table_name.to_string(),
            kind,
            chunks,
        };

        self.logger.info(&format!(
            "[{operation_id}] Reconciliation on table '{table_name}' settled: {} of {} chunks fulfilled, {} store calls",
            report.fulfilled().count(),
            report.chunk_count(),
            report.total_attempts()
        ));

        Ok(report)
    }

    async fn settle_chunk(
        &self,
        operation_id: Uuid,
        table_name: &str,
        kind: OperationKind,
        chunk_index: usize,
        chunk: &[Operation],
        cancel: &CancellationToken,
    ) -> SettledChunk {
        let mut attempts = 0;
        let outcome = self
            .drive_chunk(operation_id, table_name, kind, chunk_index, chunk, cancel, &mut attempts)
            .await;

        if let Err(error) = &outcome {
            self.logger.error(&format!(
                "[{operation_id}] Chunk {chunk_index} on table '{table_name}' rejected after {attempts} attempts: {error}"
            ));
        }

        SettledChunk {
            chunk_index,
            submitted: chunk.len(),
            attempts,
            outcome,
        }
    }

    /// Submit a chunk, then its unprocessed remainders, until nothing is left
    #[allow(clippy::too_many_arguments)]
    async fn drive_chunk(
        &self,
        operation_id: Uuid,
        table_name: &str,
        kind: OperationKind,
        chunk_index: usize,
        chunk: &[Operation],
        cancel: &CancellationToken,
        attempts: &mut u32,
    ) -> StoreResult<BulkWriteResponse> {
        let operation = kind.store_operation();
        let backoff = &self.config.backoff;
        let mut pending = chunk.to_vec();

        loop {
            let attempt = *attempts + 1;
            if !backoff.allows_attempt(attempt) {
                return Err(StoreError::TransientCapacityExceeded {
                    table: table_name.to_string(),
                    unprocessed: pending.len(),
                    attempts: *attempts,
                });
            }

            let delay = backoff.delay_before(attempt);
            if !delay.is_zero() {
                self.logger.debug(&format!(
                    "[{operation_id}] Chunk {chunk_index}: {} unprocessed, retrying in {delay:?} (attempt {attempt})",
                    pending.len()
                ));
            }
            sleep_cancellable(cancel, operation, delay).await?;
            acquire_permit(self.rate_limiter.as_ref(), cancel, operation).await?;

            *attempts = attempt;
            self.logger.debug(&format!(
                "[{operation_id}] Chunk {chunk_index}: submitting {} {kind} operations (attempt {attempt})",
                pending.len()
            ));

            let response = run_cancellable(cancel, operation, async {
                self.store
                    .bulk_write(table_name, &pending)
                    .await
                    .with_operation(table_name, operation)
            })
            .await?;

            if response.is_complete() {
                return Ok(response);
            }
            pending = response.unprocessed;
        }
    }
}
