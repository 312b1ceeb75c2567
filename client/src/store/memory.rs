use super::StoreClient;
use crate::common::errors::{BackendError, BackendResult};
use crate::model::{
    AttributeValue, BulkWriteResponse, Cursor, Item, KeySchema, Operation, OperationKind,
    ScanPage, TableDefinition, TableDescription, TableStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

const DEFAULT_PAGE_SIZE: usize = 100;

type BulkWriteFault = Arc<dyn Fn(&str, &[Operation]) -> Option<BackendError> + Send + Sync>;

/// One recorded bulk-write request
#[derive(Debug, Clone)]
pub struct BulkWriteCall {
    pub table_name: String,
    pub kind: Option<OperationKind>,
    pub operations: Vec<Operation>,
    /// When the request reached the store (tokio clock, so it follows a paused clock)
    pub at: Instant,
}

struct MemoryTable {
    key_schema: KeySchema,
    created_at: DateTime<Utc>,
    // Describes left to answer with CREATING
    pending_creation_polls: usize,
    items: BTreeMap<String, Item>,
}

#[derive(Default)]
struct FaultPlan {
    unprocessed_script: VecDeque<usize>,
    capacity_per_call: Option<usize>,
    bulk_write_fault: Option<BulkWriteFault>,
    read_failures: VecDeque<BackendError>,
}

#[derive(Default)]
struct Journal {
    bulk_writes: Vec<BulkWriteCall>,
    reads: usize,
    describes: usize,
}

/// In-process store.
///
/// Items are kept in key order; a scan page ends after `page_size` items and its
/// cursor is the key of the last item returned. Besides serving as a local
/// backend it can simulate throttling (unprocessed entries) and request
/// failures, and it records every bulk write and read for inspection.
///
/// # Examples
///
/// ```no_run
/// use tablekit::store::{MemoryStore, StoreClient};
/// use tablekit::model::{KeySchema, ScalarType, TableDefinition};
///
/// # async fn example() {
/// let store = MemoryStore::new().with_page_size(10);
/// store
///     .create_table(&TableDefinition::new("orders", KeySchema::partition("id", ScalarType::S)))
///     .await
///     .unwrap();
///
/// // The next two bulk writes leave 3 and then 1 operation unprocessed
/// store.script_unprocessed([3, 1]);
/// # }
/// ```
pub struct MemoryStore {
    page_size: usize,
    creation_polls: usize,
    tables: Mutex<HashMap<String, MemoryTable>>,
    faults: Mutex<FaultPlan>,
    journal: Mutex<Journal>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(table_name: &str) -> BackendError {
    BackendError::new(
        "ResourceNotFoundException",
        format!("Requested resource not found: Table: {table_name} not found"),
    )
    .with_status(400)
}

fn validation(message: impl Into<String>) -> BackendError {
    BackendError::new("ValidationException", message).with_status(400)
}

impl MemoryTable {
    /// Stable encoding of the key attributes, in schema order
    fn encode_key(&self, item: &Item) -> BackendResult<String> {
        let mut parts: Vec<&AttributeValue> = Vec::with_capacity(2);
        for attribute in self.key_schema.attributes() {
            let value = item.get(&attribute.name).ok_or_else(|| {
                validation(format!(
                    "One of the required keys was not given a value: {}",
                    attribute.name
                ))
            })?;
            parts.push(value);
        }
        serde_json::to_string(&parts).map_err(BackendError::from)
    }

    /// Keys passed to deletes and gets must carry exactly the key attributes
    fn encode_exact_key(&self, key: &Item) -> BackendResult<String> {
        let expected = self.key_schema.attributes().count();
        if key.len() != expected {
            return Err(validation(
                "The provided key element does not match the schema",
            ));
        }
        self.encode_key(key)
    }

    fn project_key(&self, item: &Item) -> Item {
        self.key_schema
            .attributes()
            .filter_map(|a| item.get(&a.name).map(|v| (a.name.clone(), v.clone())))
            .collect()
    }

    fn describe(&self, name: &str) -> TableDescription {
        TableDescription {
            name: name.to_string(),
            status: if self.pending_creation_polls > 0 {
                TableStatus::Creating
            } else {
                TableStatus::Active
            },
            key_schema: self.key_schema.clone(),
            item_count: Some(self.items.len() as u64),
            created_at: Some(self.created_at),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            creation_polls: 0,
            tables: Mutex::new(HashMap::new()),
            faults: Mutex::new(FaultPlan::default()),
            journal: Mutex::new(Journal::default()),
        }
    }

    /// Maximum items per scan page (a `limit` passed to `read_page` can only lower it)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// New tables report `CREATING` for this many describes before turning `ACTIVE`
    pub fn with_creation_polls(mut self, polls: usize) -> Self {
        self.creation_polls = polls;
        self
    }

    /// Queue per-call unprocessed counts for the next bulk writes.
    ///
    /// Each bulk write pops one entry and leaves that many of its trailing
    /// operations unapplied.
    pub fn script_unprocessed(&self, counts: impl IntoIterator<Item = usize>) {
        lock(&self.faults).unprocessed_script.extend(counts);
    }

    /// Apply at most `capacity` operations per bulk write; the rest come back unprocessed
    pub fn set_capacity_per_call(&self, capacity: Option<usize>) {
        lock(&self.faults).capacity_per_call = capacity;
    }

    /// Fail bulk writes for which `fault` returns an error; nothing is applied then
    pub fn fail_bulk_writes_when<F>(&self, fault: F)
    where
        F: Fn(&str, &[Operation]) -> Option<BackendError> + Send + Sync + 'static,
    {
        lock(&self.faults).bulk_write_fault = Some(Arc::new(fault));
    }

    /// Fail the next read_page call with `error`
    pub fn fail_next_read(&self, error: BackendError) {
        lock(&self.faults).read_failures.push_back(error);
    }

    pub fn clear_faults(&self) {
        *lock(&self.faults) = FaultPlan::default();
    }

    pub fn bulk_write_calls(&self) -> Vec<BulkWriteCall> {
        lock(&self.journal).bulk_writes.clone()
    }

    pub fn read_page_calls(&self) -> usize {
        lock(&self.journal).reads
    }

    pub fn describe_calls(&self) -> usize {
        lock(&self.journal).describes
    }

    pub fn reset_journal(&self) {
        *lock(&self.journal) = Journal::default();
    }

    /// Number of items in a table, `None` if the table does not exist
    pub fn item_count(&self, table_name: &str) -> Option<usize> {
        lock(&self.tables).get(table_name).map(|t| t.items.len())
    }

    /// Split a bulk write into (applied, unprocessed) according to the fault plan
    fn plan_bulk_write(&self, table_name: &str, operations: &[Operation]) -> BackendResult<usize> {
        let mut faults = lock(&self.faults);

        if let Some(fault) = &faults.bulk_write_fault {
            if let Some(error) = fault(table_name, operations) {
                return Err(error);
            }
        }

        let scripted = faults.unprocessed_script.pop_front().unwrap_or(0);
        let over_capacity = faults
            .capacity_per_call
            .map(|capacity| operations.len().saturating_sub(capacity))
            .unwrap_or(0);

        Ok(scripted.max(over_capacity).min(operations.len()))
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn bulk_write(
        &self,
        table_name: &str,
        operations: &[Operation],
    ) -> BackendResult<BulkWriteResponse> {
        lock(&self.journal).bulk_writes.push(BulkWriteCall {
            table_name: table_name.to_string(),
            kind: operations.first().map(Operation::kind),
            operations: operations.to_vec(),
            at: Instant::now(),
        });

        if operations.len() > crate::model::MAX_CHUNK_SIZE {
            return Err(validation(format!(
                "Too many items requested for the BatchWriteItem call: {}",
                operations.len()
            )));
        }

        let mut tables = lock(&self.tables);
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| not_found(table_name))?;

        // Encode every key up front so a bad entry rejects the whole request
        let encoded = operations
            .iter()
            .map(|operation| match operation {
                Operation::Write(item) => table.encode_key(item),
                Operation::Delete(key) => table.encode_exact_key(key),
            })
            .collect::<BackendResult<Vec<_>>>()?;

        let unprocessed_count = self.plan_bulk_write(table_name, operations)?;
        let applied = operations.len() - unprocessed_count;

        for (operation, key) in operations.iter().zip(encoded).take(applied) {
            match operation {
                Operation::Write(item) => {
                    table.items.insert(key, item.clone());
                }
                Operation::Delete(_) => {
                    table.items.remove(&key);
                }
            }
        }

        Ok(BulkWriteResponse {
            unprocessed: operations[applied..].to_vec(),
        })
    }

    async fn read_page(
        &self,
        table_name: &str,
        cursor: Option<&Cursor>,
        limit: Option<u32>,
    ) -> BackendResult<ScanPage> {
        lock(&self.journal).reads += 1;

        if let Some(error) = lock(&self.faults).read_failures.pop_front() {
            return Err(error);
        }

        let tables = lock(&self.tables);
        let table = tables.get(table_name).ok_or_else(|| not_found(table_name))?;

        let page_size = limit
            .map(|l| (l as usize).clamp(1, self.page_size))
            .unwrap_or(self.page_size);

        let start = match cursor {
            Some(cursor) => Bound::Excluded(table.encode_key(cursor.as_key())?),
            None => Bound::Unbounded,
        };

        let mut range = table.items.range((start, Bound::Unbounded));
        let items: Vec<Item> = range
            .by_ref()
            .take(page_size)
            .map(|(_, item)| item.clone())
            .collect();

        // Like the real store, a full page carries a cursor even when nothing follows
        let next_cursor = if items.len() == page_size {
            items.last().map(|last| Cursor::from_key(table.project_key(last)))
        } else {
            None
        };

        Ok(ScanPage { items, next_cursor })
    }

    async fn get_item(&self, table_name: &str, key: &Item) -> BackendResult<Option<Item>> {
        let tables = lock(&self.tables);
        let table = tables.get(table_name).ok_or_else(|| not_found(table_name))?;
        let encoded = table.encode_exact_key(key)?;
        Ok(table.items.get(&encoded).cloned())
    }

    async fn put_item(&self, table_name: &str, item: &Item) -> BackendResult<()> {
        let mut tables = lock(&self.tables);
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| not_found(table_name))?;
        let encoded = table.encode_key(item)?;
        table.items.insert(encoded, item.clone());
        Ok(())
    }

    async fn delete_item(&self, table_name: &str, key: &Item) -> BackendResult<()> {
        let mut tables = lock(&self.tables);
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| not_found(table_name))?;
        let encoded = table.encode_exact_key(key)?;
        table.items.remove(&encoded);
        Ok(())
    }

    async fn create_table(&self, definition: &TableDefinition) -> BackendResult<TableDescription> {
        let mut tables = lock(&self.tables);
        if tables.contains_key(&definition.name) {
            return Err(BackendError::new(
                "ResourceInUseException",
                format!("Table already exists: {}", definition.name),
            )
            .with_status(400));
        }

        let table = MemoryTable {
            key_schema: definition.key_schema.clone(),
            created_at: Utc::now(),
            pending_creation_polls: self.creation_polls,
            items: BTreeMap::new(),
        };
        let description = table.describe(&definition.name);
        tables.insert(definition.name.clone(), table);
        Ok(description)
    }

    async fn delete_table(&self, table_name: &str) -> BackendResult<()> {
        lock(&self.tables)
            .remove(table_name)
            .map(|_| ())
            .ok_or_else(|| not_found(table_name))
    }

    async fn describe_table(&self, table_name: &str) -> BackendResult<Option<TableDescription>> {
        lock(&self.journal).describes += 1;

        let mut tables = lock(&self.tables);
        Ok(tables.get_mut(table_name).map(|table| {
            let description = table.describe(table_name);
            table.pending_creation_polls = table.pending_creation_polls.saturating_sub(1);
            description
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ScalarType, item_from_json};
    use serde_json::json;

    fn item(value: serde_json::Value) -> Item {
        item_from_json(value).unwrap()
    }

    async fn store_with_table() -> MemoryStore {
        let store = MemoryStore::new().with_page_size(2);
        store
            .create_table(&TableDefinition::new(
                "orders",
                KeySchema::partition("id", ScalarType::S),
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn scripted_unprocessed_entries_are_not_applied() {
        let store = store_with_table().await;
        store.script_unprocessed([2]);

        let ops: Vec<Operation> = (0..5)
            .map(|i| Operation::Write(item(json!({"id": format!("o{i}")}))))
            .collect();
        let response = store.bulk_write("orders", &ops).await.unwrap();

        assert_eq!(response.unprocessed, ops[3..].to_vec());
        assert_eq!(store.item_count("orders"), Some(3));

        let response = store.bulk_write("orders", &response.unprocessed).await.unwrap();
        assert!(response.is_complete());
        assert_eq!(store.item_count("orders"), Some(5));
        assert_eq!(store.bulk_write_calls().len(), 2);
    }

    #[tokio::test]
    async fn capacity_limits_each_call() {
        let store = store_with_table().await;
        store.set_capacity_per_call(Some(1));

        let ops: Vec<Operation> = (0..3)
            .map(|i| Operation::Write(item(json!({"id": format!("o{i}")}))))
            .collect();
        let response = store.bulk_write("orders", &ops).await.unwrap();
        assert_eq!(response.unprocessed.len(), 2);
    }

    #[tokio::test]
    async fn scan_pages_follow_the_cursor() {
        let store = store_with_table().await;
        for i in 0..5 {
            store
                .put_item("orders", &item(json!({"id": format!("o{i}"), "n": i})))
                .await
                .unwrap();
        }

        let mut cursor = None;
        let mut seen = Vec::new();
        loop {
            let page = store.read_page("orders", cursor.as_ref(), None).await.unwrap();
            seen.extend(page.items.iter().map(|i| i["id"].clone()));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen.len(), 5);
        assert_eq!(store.read_page_calls(), 3);
    }

    #[tokio::test]
    async fn delete_key_must_match_schema() {
        let store = store_with_table().await;
        let err = store
            .delete_item("orders", &item(json!({"id": "o1", "extra": 1})))
            .await
            .unwrap_err();
        assert_eq!(err.code, "ValidationException");
    }

    #[tokio::test]
    async fn missing_table_is_not_found() {
        let store = MemoryStore::new();
        let err = store.read_page("nope", None, None).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.describe_table("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn creation_polls_delay_active_status() {
        let store = MemoryStore::new().with_creation_polls(2);
        store
            .create_table(&TableDefinition::new(
                "orders",
                KeySchema::partition("id", ScalarType::S),
            ))
            .await
            .unwrap();

        let mut statuses = Vec::new();
        for _ in 0..3 {
            statuses.push(store.describe_table("orders").await.unwrap().unwrap().status);
        }

        assert_eq!(
            statuses,
            vec![TableStatus::Creating, TableStatus::Creating, TableStatus::Active]
        );
    }
}
