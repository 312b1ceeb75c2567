use super::cancellation::{acquire_permit, run_cancellable};
use super::reconciler::BulkReconciler;
use crate::common::errors::{ErrorContext, StoreError, StoreOperation, StoreResult};
use crate::model::{Cursor, Item, Operation};
use crate::validation::{KeyNamesValidator, Validator, validate_table_name};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Deletes every item of a table, one scan page at a time.
///
/// Each page is projected to the key attributes and deleted through the
/// [`BulkReconciler`] before the next page is read. Scanning continues while a
/// page carries a cursor or had items, so the final read is always an empty
/// page without a cursor.
#[derive(Clone)]
pub struct TablePurger {
    reconciler: BulkReconciler,
    page_size: Option<u32>,
}

impl TablePurger {
    pub fn new(reconciler: BulkReconciler) -> Self {
        Self {
            reconciler,
            page_size: None,
        }
    }

    /// Items requested per page; `None` leaves it to the store
    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Delete every item of `table_name`, returning the number of items removed.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidArgument`] for an invalid table name, an invalid
    /// key attribute list, a zero page size or an item that lacks one of the
    /// key attributes. A
    /// failed page read or a rejected delete chunk stops the purge with that
    /// error; deletions already applied stay applied.
    pub async fn purge(&self, table_name: &str, key_attribute_names: &[String]) -> StoreResult<u64> {
        self.purge_with_cancel(table_name, key_attribute_names, &CancellationToken::new())
            .await
    }

    pub async fn purge_with_cancel(
        &self,
        table_name: &str,
        key_attribute_names: &[String],
        cancel: &CancellationToken,
    ) -> StoreResult<u64> {
        validate_table_name(table_name)?;
        KeyNamesValidator.validate(key_attribute_names)?;
        if self.page_size == Some(0) {
            return Err(StoreError::invalid("purge page size must be greater than 0"));
        }

        let purge_id = Uuid::new_v4();
        let logger = self.reconciler.logger();
        logger.info(&format!(
            "[{purge_id}] Purging table '{table_name}' by key [{}]",
            key_attribute_names.join(", ")
        ));

        match self
            .purge_pages(purge_id, table_name, key_attribute_names, cancel)
            .await
        {
            Ok((purged, pages)) => {
                logger.info(&format!(
                    "[{purge_id}] Purged {purged} items from table '{table_name}' in {pages} pages"
                ));
                Ok(purged)
            }
            Err(error) => {
                logger.error(&format!(
                    "[{purge_id}] Purge of table '{table_name}' failed: {error}"
                ));
                Err(error)
            }
        }
    }

    async fn purge_pages(
        &self,
        purge_id: Uuid,
        table_name: &str,
        key_attribute_names: &[String],
        cancel: &CancellationToken,
    ) -> StoreResult<(u64, usize)> {
        let store = self.reconciler.store();
        let mut cursor: Option<Cursor> = None;
        let mut purged = 0u64;
        let mut pages = 0usize;

        loop {
            acquire_permit(self.reconciler.rate_limiter(), cancel, StoreOperation::ReadPage).await?;
            let page = run_cancellable(cancel, StoreOperation::ReadPage, async {
                store
                    .read_page(table_name, cursor.as_ref(), self.page_size)
                    .await
                    .with_operation(table_name, StoreOperation::ReadPage)
            })
            .await?;
            pages += 1;

            let had_items = !page.items.is_empty();
            if had_items {
                let keys = page
                    .items
                    .iter()
                    .map(|item| project_key(item, key_attribute_names).map(Operation::Delete))
                    .collect::<StoreResult<Vec<_>>>()?;

                self.reconciler
                    .reconcile_with_cancel(table_name, &keys, cancel)
                    .await?
                    .into_result()?;

                purged += keys.len() as u64;
                self.reconciler.logger().debug(&format!(
                    "[{purge_id}] Page {pages}: deleted {} items ({purged} so far)",
                    keys.len()
                ));
            }

            cursor = page.next_cursor;
            if cursor.is_none() && !had_items {
                return Ok((purged, pages));
            }
        }
    }
}

/// Reduce an item to the named key attributes.
///
/// # Errors
///
/// [`StoreError::InvalidArgument`] when the item lacks one of them.
pub fn project_key(item: &Item, key_attribute_names: &[String]) -> StoreResult<Item> {
    key_attribute_names
        .iter()
        .map(|name| {
            item.get(name)
                .map(|value| (name.clone(), value.clone()))
                .ok_or_else(|| {
                    StoreError::invalid(format!("item is missing key attribute '{name}'"))
                })
        })
        .collect()
}
