//! # Store Module
//!
//! The capability the rest of the library consumes: single requests against
//! the backing store. Nothing in here retries, chunks or paginates; that is
//! the job of [`crate::bulk_operations`] and [`crate::table_client`].
//!
//! ## Implementations
//!
//! - [`HttpStoreClient`] - JSON-over-HTTP transport for DynamoDB-compatible endpoints
//! - [`MemoryStore`] - in-process store with failure and throttling injection

use crate::common::errors::BackendResult;
use crate::model::{BulkWriteResponse, Cursor, Item, Operation, ScanPage, TableDefinition, TableDescription};
use async_trait::async_trait;

/// JSON-over-HTTP transport
pub mod http;
/// In-process store for tests and local use
pub mod memory;
/// Request and response bodies of the JSON protocol
pub mod wire;

pub use http::{HttpStoreClient, HttpStoreConfig};
pub use memory::{BulkWriteCall, MemoryStore};

/// Single-request access to the backing store.
///
/// Implementations must be safe to share: the reconciler drives many chunks
/// through one `Arc<dyn StoreClient>` at the same time.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tablekit::store::{MemoryStore, StoreClient};
///
/// let store: Arc<dyn StoreClient> = Arc::new(MemoryStore::new());
/// ```
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Apply up to 25 puts or deletes in one request.
    ///
    /// Returns the operations the store did not apply (throttling, capacity).
    /// An `Err` means the request as a whole failed.
    async fn bulk_write(
        &self,
        table_name: &str,
        operations: &[Operation],
    ) -> BackendResult<BulkWriteResponse>;

    /// Read one page of a full-table scan, resuming after `cursor`.
    async fn read_page(
        &self,
        table_name: &str,
        cursor: Option<&Cursor>,
        limit: Option<u32>,
    ) -> BackendResult<ScanPage>;

    async fn get_item(&self, table_name: &str, key: &Item) -> BackendResult<Option<Item>>;

    async fn put_item(&self, table_name: &str, item: &Item) -> BackendResult<()>;

    async fn delete_item(&self, table_name: &str, key: &Item) -> BackendResult<()>;

    async fn create_table(&self, definition: &TableDefinition) -> BackendResult<TableDescription>;

    async fn delete_table(&self, table_name: &str) -> BackendResult<()>;

    /// Describe a table; `None` when it does not exist.
    async fn describe_table(&self, table_name: &str) -> BackendResult<Option<TableDescription>>;
}
