//! # Table Client
//!
//! The facade most callers use. It validates input, logs every operation
//! through the injected [`StoreLogger`], waits for the optional rate limiter
//! and wraps store errors with the table and operation they came from.
//!
//! Table lifecycle operations (create, delete, describe and the wait helpers)
//! live in [`lifecycle`]; item, scan, bulk and purge operations are here.

use crate::bulk_operations::{BulkReconciler, ReconcileReport, TablePurger};
use crate::common::errors::{BackendResult, ErrorContext, StoreError, StoreOperation, StoreResult};
use crate::common::rate_limiter::RateLimiter;
use crate::config::ClientConfig;
use crate::logging::{StoreLogger, default_logger};
use crate::model::{Cursor, Item, Operation, ScanPage};
use crate::store::{HttpStoreClient, StoreClient};
use crate::validation::{ItemValidator, Validator, validate_table_name};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod lifecycle;

/// Validated, logged access to one store.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tablekit::config::ClientConfig;
/// use tablekit::model::{KeySchema, ScalarType, TableDefinition, item_from_json};
/// use tablekit::store::MemoryStore;
/// use tablekit::table_client::TableClient;
///
/// # async fn example() -> Result<(), tablekit::common::StoreError> {
/// let client = TableClient::new(Arc::new(MemoryStore::new()), ClientConfig::default())?;
///
/// client
///     .create_table(&TableDefinition::new("orders", KeySchema::partition("id", ScalarType::S)))
///     .await?;
/// client.wait_until_active("orders").await?;
///
/// let items = (0..100)
///     .map(|i| item_from_json(serde_json::json!({"id": format!("order-{i}")})))
///     .collect::<Result<Vec<_>, _>>()?;
/// client.bulk_write("orders", items).await?.into_result()?;
///
/// let removed = client.purge_by_schema("orders").await?;
/// assert_eq!(removed, 100);
/// # Ok(())
/// # }
/// ```
pub struct TableClient {
    store: Arc<dyn StoreClient>,
    config: ClientConfig,
    logger: Arc<dyn StoreLogger>,
    rate_limiter: Option<RateLimiter>,
    reconciler: BulkReconciler,
    purger: TablePurger,
}

impl TableClient {
    /// Create a client logging through the `log` crate.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidArgument`] when the configured rate limit or scan
    /// page size is invalid.
    pub fn new(store: Arc<dyn StoreClient>, config: ClientConfig) -> StoreResult<Self> {
        Self::with_logger(store, config, default_logger())
    }

    pub fn with_logger(
        store: Arc<dyn StoreClient>,
        config: ClientConfig,
        logger: Arc<dyn StoreLogger>,
    ) -> StoreResult<Self> {
        if config.scan_page_size() == Some(0) {
            return Err(StoreError::invalid("scan page size must be greater than 0"));
        }
        let rate_limiter = config.rate_limiter()?;

        let mut reconciler =
            BulkReconciler::new(store.clone(), config.reconcile_config(), logger.clone());
        if let Some(limiter) = &rate_limiter {
            reconciler = reconciler.with_rate_limiter(limiter.clone());
        }
        let purger = TablePurger::new(reconciler.clone()).with_page_size(config.scan_page_size());

        Ok(Self {
            store,
            config,
            logger,
            rate_limiter,
            reconciler,
            purger,
        })
    }

    /// Create a client over [`HttpStoreClient`] using the config's endpoint.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidArgument`] without an endpoint, with an invalid rate
    /// limit, or when the HTTP client cannot be built.
    pub fn connect(config: ClientConfig, logger: Arc<dyn StoreLogger>) -> StoreResult<Self> {
        let http_config = config.http_store_config()?;
        let http = HttpStoreClient::from_config(http_config)
            .map_err(|e| StoreError::invalid(format!("cannot build HTTP client: {e}")))?
            .with_logger(logger.clone());

        Self::with_logger(Arc::new(http), config, logger)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn StoreClient> {
        &self.store
    }

    pub fn reconciler(&self) -> &BulkReconciler {
        &self.reconciler
    }

    pub fn purger(&self) -> &TablePurger {
        &self.purger
    }

    /// Run one store call: rate limit, wrap errors, log failures
    async fn call<T, F>(&self, table_name: &str, operation: StoreOperation, request: F) -> StoreResult<T>
    where
        F: Future<Output = BackendResult<T>>,
    {
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait_until_ready().await;
        }

        let result = request.await.with_operation(table_name, operation);
        if let Err(error) = &result {
            self.logger.error(&error.to_string());
        }
        result
    }

    /// Log and return a validation failure
    fn rejected<T>(&self, error: StoreError) -> StoreResult<T> {
        self.logger.error(&error.to_string());
        Err(error)
    }

    fn validate_target(&self, table_name: &str, item: Option<&Item>) -> StoreResult<()> {
        let result = validate_table_name(table_name)
            .and_then(|_| item.map_or(Ok(()), |item| ItemValidator.validate(item)));
        match result {
            Ok(()) => Ok(()),
            Err(error) => self.rejected(error),
        }
    }

    pub async fn get_item(&self, table_name: &str, key: &Item) -> StoreResult<Option<Item>> {
        self.validate_target(table_name, Some(key))?;
        self.logger
            .info(&format!("Getting item from table '{table_name}'"));

        let item = self
            .call(table_name, StoreOperation::GetItem, self.store.get_item(table_name, key))
            .await?;

        self.logger.info(&format!(
            "Get item on table '{table_name}': {}",
            if item.is_some() { "found" } else { "not found" }
        ));
        Ok(item)
    }

    pub async fn put_item(&self, table_name: &str, item: &Item) -> StoreResult<()> {
        self.validate_target(table_name, Some(item))?;
        self.logger.info(&format!("Putting item into table '{table_name}'"));

        self.call(table_name, StoreOperation::PutItem, self.store.put_item(table_name, item))
            .await?;

        self.logger.info(&format!("Put item into table '{table_name}'"));
        Ok(())
    }

    pub async fn delete_item(&self, table_name: &str, key: &Item) -> StoreResult<()> {
        self.validate_target(table_name, Some(key))?;
        self.logger.info(&format!("Deleting item from table '{table_name}'"));

        self.call(
            table_name,
            StoreOperation::DeleteItem,
            self.store.delete_item(table_name, key),
        )
        .await?;

        self.logger.info(&format!("Deleted item from table '{table_name}'"));
        Ok(())
    }

    /// Read one scan page.
    ///
    /// `limit` overrides the configured page size; zero is rejected.
    pub async fn scan_page(
        &self,
        table_name: &str,
        cursor: Option<&Cursor>,
        limit: Option<u32>,
    ) -> StoreResult<ScanPage> {
        self.validate_target(table_name, None)?;
        if limit == Some(0) {
            return self.rejected(StoreError::invalid("scan limit must be greater than 0"));
        }

        let limit = limit.or(self.config.scan_page_size());
        let page = self
            .call(
                table_name,
                StoreOperation::ReadPage,
                self.store.read_page(table_name, cursor, limit),
            )
            .await?;

        self.logger.info(&format!(
            "Scanned {} items from table '{table_name}' (more: {})",
            page.items.len(),
            !page.is_last()
        ));
        Ok(page)
    }

    /// Read every item of a table, following cursors until the last page
    pub async fn scan_all(&self, table_name: &str) -> StoreResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut cursor: Option<Cursor> = None;

        loop {
            let page = self.scan_page(table_name, cursor.as_ref(), None).await?;
            items.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        self.logger.info(&format!(
            "Scanned table '{table_name}': {} items",
            items.len()
        ));
        Ok(items)
    }

    /// Put every item, retrying unprocessed entries.
    ///
    /// The returned report settles each chunk separately; use
    /// [`ReconcileReport::into_result`] to turn a partial failure into an error.
    pub async fn bulk_write(&self, table_name: &str, items: Vec<Item>) -> StoreResult<ReconcileReport> {
        self.bulk_write_with_cancel(table_name, items, &CancellationToken::new())
            .await
    }

    pub async fn bulk_write_with_cancel(
        &self,
        table_name: &str,
        items: Vec<Item>,
        cancel: &CancellationToken,
    ) -> StoreResult<ReconcileReport> {
        let operations: Vec<Operation> = items.into_iter().map(Operation::Write).collect();
        self.reconcile(table_name, &operations, cancel).await
    }

    /// Delete every key, retrying unprocessed entries
    pub async fn bulk_delete(&self, table_name: &str, keys: Vec<Item>) -> StoreResult<ReconcileReport> {
        self.bulk_delete_with_cancel(table_name, keys, &CancellationToken::new())
            .await
    }

    pub async fn bulk_delete_with_cancel(
        &self,
        table_name: &str,
        keys: Vec<Item>,
        cancel: &CancellationToken,
    ) -> StoreResult<ReconcileReport> {
        let operations: Vec<Operation> = keys.into_iter().map(Operation::Delete).collect();
        self.reconcile(table_name, &operations, cancel).await
    }

    async fn reconcile(
        &self,
        table_name: &str,
        operations: &[Operation],
        cancel: &CancellationToken,
    ) -> StoreResult<ReconcileReport> {
        match self
            .reconciler
            .reconcile_with_cancel(table_name, operations, cancel)
            .await
        {
            Ok(report) => Ok(report),
            Err(error) => self.rejected(error),
        }
    }

    /// Delete every item of `table_name`, projecting items to `key_attribute_names`
    pub async fn purge(&self, table_name: &str, key_attribute_names: &[String]) -> StoreResult<u64> {
        self.purger.purge(table_name, key_attribute_names).await
    }

    pub async fn purge_with_cancel(
        &self,
        table_name: &str,
        key_attribute_names: &[String],
        cancel: &CancellationToken,
    ) -> StoreResult<u64> {
        self.purger
            .purge_with_cancel(table_name, key_attribute_names, cancel)
            .await
    }

    /// Purge using the key schema the store reports for the table.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidArgument`] when the table does not exist.
    pub async fn purge_by_schema(&self, table_name: &str) -> StoreResult<u64> {
        let description = match self.describe_table(table_name).await? {
            Some(description) => description,
            None => {
                return self.rejected(StoreError::invalid(format!(
                    "cannot purge table '{table_name}': table does not exist"
                )));
            }
        };

        self.purge(table_name, &description.key_schema.attribute_names())
            .await
    }
}
