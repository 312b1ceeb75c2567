use claims::{assert_matches, assert_ok};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tablekit::bulk_operations::{BackoffPolicy, BulkReconciler, ReconcileConfig};
use tablekit::common::{BackendError, StoreError, StoreOperation};
use tablekit::logging::{LogLevel, RecordingLogger};
use tablekit::model::{
    KeySchema, Operation, OperationKind, ScalarType, TableDefinition, item_from_json,
};
use tablekit::store::{MemoryStore, StoreClient};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// Helper module for reconciliation testing
mod reconcile_helpers {
    use super::*;

    pub const TABLE: &str = "inventory";

    pub async fn create_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .create_table(&TableDefinition::new(
                TABLE,
                KeySchema::partition("sku", ScalarType::S),
            ))
            .await
            .expect("Failed to create test table");
        store
    }

    pub fn create_reconciler(
        store: &Arc<MemoryStore>,
        config: ReconcileConfig,
    ) -> (BulkReconciler, RecordingLogger) {
        let logger = RecordingLogger::default();
        let reconciler = BulkReconciler::new(store.clone(), config, Arc::new(logger.clone()));
        (reconciler, logger)
    }

    pub fn writes(count: usize) -> Vec<Operation> {
        (0..count)
            .map(|i| {
                Operation::Write(
                    item_from_json(json!({"sku": format!("sku-{i:05}"), "qty": i}))
                        .expect("valid item"),
                )
            })
            .collect()
    }

    pub fn deletes(count: usize) -> Vec<Operation> {
        (0..count)
            .map(|i| {
                Operation::Delete(
                    item_from_json(json!({"sku": format!("sku-{i:05}")})).expect("valid key"),
                )
            })
            .collect()
    }
}

use reconcile_helpers::*;

mod chunking {
    use super::*;

    #[tokio::test]
    async fn test_twenty_six_writes_make_two_chunks() {
        let store = create_store().await;
        let (reconciler, _) = create_reconciler(&store, ReconcileConfig::default());

        let report = reconciler.reconcile(TABLE, &writes(26)).await.unwrap();

        assert_eq!(report.chunk_count(), 2);
        assert_eq!(report.kind, OperationKind::Write);
        let sizes: Vec<usize> = store
            .bulk_write_calls()
            .iter()
            .map(|call| call.operations.len())
            .collect();
        assert_eq!(sizes.iter().sum::<usize>(), 26);
        assert!(sizes.contains(&25) && sizes.contains(&1));
    }

    #[tokio::test]
    async fn test_exact_multiple_of_chunk_size() {
        let store = create_store().await;
        let (reconciler, _) = create_reconciler(&store, ReconcileConfig::default());

        let report = reconciler.reconcile(TABLE, &writes(100)).await.unwrap();

        assert_eq!(report.chunk_count(), 4);
        assert_eq!(report.total_attempts(), 4);
        assert_eq!(store.item_count(TABLE), Some(100));
    }

    #[tokio::test]
    async fn test_smaller_configured_chunk_size() {
        let store = create_store().await;
        let (reconciler, _) =
            create_reconciler(&store, ReconcileConfig::default().with_chunk_size(10));

        let report = reconciler.reconcile(TABLE, &writes(35)).await.unwrap();

        assert_eq!(report.chunk_count(), 4);
        assert!(store.bulk_write_calls().iter().all(|c| c.operations.len() <= 10));
    }

    #[tokio::test]
    async fn test_every_call_targets_the_table_with_one_kind() {
        let store = create_store().await;
        let (reconciler, _) = create_reconciler(&store, ReconcileConfig::default());
        reconciler.reconcile(TABLE, &writes(60)).await.unwrap();
        store.reset_journal();

        let report = reconciler.reconcile(TABLE, &deletes(60)).await.unwrap();

        assert!(report.is_complete_success());
        assert!(store.bulk_write_calls().iter().all(|call| {
            call.table_name == TABLE && call.kind == Some(OperationKind::Delete)
        }));
        assert_eq!(store.item_count(TABLE), Some(0));
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn test_mixed_kinds_rejected_before_store_calls() {
        let store = create_store().await;
        let (reconciler, _) = create_reconciler(&store, ReconcileConfig::default());
        let mut operations = writes(30);
        operations.extend(deletes(1));

        let err = reconciler.reconcile(TABLE, &operations).await.unwrap_err();

        assert_matches!(err, StoreError::InvalidArgument(_));
        assert!(store.bulk_write_calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_list_and_bad_table_name() {
        let store = create_store().await;
        let (reconciler, _) = create_reconciler(&store, ReconcileConfig::default());

        assert!(reconciler.reconcile(TABLE, &[]).await.unwrap_err().is_invalid_argument());
        assert!(
            reconciler
                .reconcile("no spaces allowed", &writes(1))
                .await
                .unwrap_err()
                .is_invalid_argument()
        );
        assert!(store.bulk_write_calls().is_empty());
    }
}

mod backoff {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_retry_schedule_is_zero_then_doubling() {
        let base = Duration::from_millis(250);
        let store = create_store().await;
        let (reconciler, logger) = create_reconciler(
            &store,
            ReconcileConfig::default().with_backoff(BackoffPolicy::new(base)),
        );
        store.script_unprocessed([4, 4, 2, 1]);

        let start = Instant::now();
        let report = reconciler.reconcile(TABLE, &writes(20)).await.unwrap();

        assert_eq!(report.chunks[0].attempts, 5);
        let calls = store.bulk_write_calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0].at, start);

        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1].at - w[0].at).collect();
        assert_eq!(gaps, vec![base, base * 2, base * 4, base * 8]);

        let retry_lines = logger
            .lines_at(LogLevel::Debug)
            .into_iter()
            .filter(|line| line.contains("retrying in"))
            .count();
        assert_eq!(retry_lines, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_delay_clamps_the_schedule() {
        let store = create_store().await;
        let policy = BackoffPolicy::new(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(300));
        let (reconciler, _) =
            create_reconciler(&store, ReconcileConfig::default().with_backoff(policy));
        store.script_unprocessed([1, 1, 1, 1]);

        reconciler.reconcile(TABLE, &writes(5)).await.unwrap();

        let calls = store.bulk_write_calls();
        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1].at - w[0].at).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300),
                Duration::from_millis(300),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_keeps_retrying() {
        let store = create_store().await;
        let (reconciler, _) = create_reconciler(&store, ReconcileConfig::default());
        store.script_unprocessed(std::iter::repeat_n(1, 12));

        let report = reconciler.reconcile(TABLE, &writes(3)).await.unwrap();

        assert!(report.is_complete_success());
        assert_eq!(report.chunks[0].attempts, 13);
        assert_eq!(store.item_count(TABLE), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_policy_surfaces_capacity_error() {
        let store = create_store().await;
        let policy = BackoffPolicy::new(Duration::from_millis(10)).with_max_attempts(4);
        let (reconciler, logger) =
            create_reconciler(&store, ReconcileConfig::default().with_backoff(policy));
        store.set_capacity_per_call(Some(0));

        let report = reconciler.reconcile(TABLE, &writes(30)).await.unwrap();

        assert_eq!(report.rejected().count(), 2);
        for chunk in report.rejected() {
            assert_eq!(chunk.attempts, 4);
            assert_matches!(
                &chunk.outcome,
                Err(StoreError::TransientCapacityExceeded { attempts: 4, .. })
            );
        }
        assert_eq!(store.bulk_write_calls().len(), 8);
        assert_eq!(logger.lines_at(LogLevel::Error).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_back_off_independently() {
        let store = create_store().await;
        let (reconciler, _) = create_reconciler(&store, ReconcileConfig::default());
        // Only the first submitted chunk sees throttling
        store.script_unprocessed([5]);

        let report = reconciler.reconcile(TABLE, &writes(50)).await.unwrap();

        let attempts: Vec<u32> = report.chunks.iter().map(|c| c.attempts).collect();
        assert_eq!(attempts.iter().sum::<u32>(), 3);
        assert!(attempts.contains(&1) && attempts.contains(&2));
        assert!(report.is_complete_success());
    }
}

mod failure_isolation {
    use super::*;

    #[tokio::test]
    async fn test_store_error_rejects_only_its_chunk() {
        let store = create_store().await;
        let (reconciler, _) = create_reconciler(&store, ReconcileConfig::default());
        store.fail_bulk_writes_when(|_, ops| {
            ops.iter()
                .any(|op| op.payload()["sku"].as_s() == Some("sku-00000"))
                .then(|| {
                    BackendError::new("ValidationException", "item too large")
                        .with_status(400)
                        .with_request_id("REQ-7")
                })
        });

        let report = reconciler.reconcile(TABLE, &writes(75)).await.unwrap();

        assert_eq!(report.fulfilled().count(), 2);
        assert_eq!(report.applied_operations(), 50);
        let rejected = report.rejected().next().expect("one rejected chunk");
        assert_eq!(rejected.chunk_index, 0);
        assert_eq!(rejected.attempts, 1);

        let err = report.into_result().unwrap_err();
        assert_matches!(
            &err,
            StoreError::BackendFailure { operation: StoreOperation::BulkWrite, .. }
        );
        assert!(err.to_string().contains("REQ-7"));
    }
}

mod cancellation {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_backing_off() {
        let store = create_store().await;
        let (reconciler, _) = create_reconciler(
            &store,
            ReconcileConfig::default().with_backoff(BackoffPolicy::new(Duration::from_secs(10))),
        );
        store.script_unprocessed([3, 3]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let report = assert_ok!(
            reconciler
                .reconcile_with_cancel(TABLE, &writes(40), &cancel)
                .await
        );

        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert!(report.rejected().all(|c| c.outcome.as_ref().is_err_and(StoreError::is_cancelled)));
        assert!(report.rejected().count() >= 1);
    }
}
