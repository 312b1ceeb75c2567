//! Table lifecycle: create, delete, describe, and polling until a table is
//! active or gone.

use super::TableClient;
use crate::common::errors::{StoreError, StoreOperation, StoreResult};
use crate::model::{TableDefinition, TableDescription};
use crate::validation::{KeyNamesValidator, Validator, validate_table_name};
use tokio::time::Instant;

impl TableClient {
    /// Create a table with on-demand billing.
    ///
    /// The store usually answers while the table is still `CREATING`; use
    /// [`wait_until_active`](Self::wait_until_active) before writing to it.
    pub async fn create_table(&self, definition: &TableDefinition) -> StoreResult<TableDescription> {
        let valid = validate_table_name(&definition.name).and_then(|_| {
            KeyNamesValidator.validate(&definition.key_schema.attribute_names()[..])
        });
        if let Err(error) = valid {
            return self.rejected(error);
        }

        self.logger.info(&format!(
            "Creating table '{}' with key [{}]",
            definition.name,
            definition.key_schema.attribute_names().join(", ")
        ));

        let description = self
            .call(
                &definition.name,
                StoreOperation::CreateTable,
                self.store.create_table(definition),
            )
            .await?;

        self.logger.info(&format!(
            "Created table '{}' (status {})",
            description.name,
            description.status.as_wire()
        ));
        Ok(description)
    }

    pub async fn delete_table(&self, table_name: &str) -> StoreResult<()> {
        self.validate_target(table_name, None)?;
        self.logger.info(&format!("Deleting table '{table_name}'"));

        self.call(
            table_name,
            StoreOperation::DeleteTable,
            self.store.delete_table(table_name),
        )
        .await?;

        self.logger.info(&format!("Deleted table '{table_name}'"));
        Ok(())
    }

    /// Describe a table; `None` when it does not exist
    pub async fn describe_table(&self, table_name: &str) -> StoreResult<Option<TableDescription>> {
        self.validate_target(table_name, None)?;

        let description = self
            .call(
                table_name,
                StoreOperation::DescribeTable,
                self.store.describe_table(table_name),
            )
            .await?;

        self.logger.debug(&format!(
            "Described table '{table_name}': {}",
            description
                .as_ref()
                .map_or("not found", |d| d.status.as_wire())
        ));
        Ok(description)
    }

    /// Poll until the table exists and is `ACTIVE`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Timeout`] after the configured number of polls.
    pub async fn wait_until_active(&self, table_name: &str) -> StoreResult<TableDescription> {
        self.logger
            .info(&format!("Waiting for table '{table_name}' to become active"));

        let found = self
            .poll_table(table_name, |description| {
                description.filter(TableDescription::is_active)
            })
            .await?;

        self.logger.info(&format!("Table '{table_name}' is active"));
        Ok(found)
    }

    /// Poll until describing the table reports that it no longer exists.
    pub async fn wait_until_deleted(&self, table_name: &str) -> StoreResult<()> {
        self.logger
            .info(&format!("Waiting for table '{table_name}' to be deleted"));

        self.poll_table(table_name, |description| match description {
            None => Some(()),
            Some(_) => None,
        })
        .await?;

        self.logger.info(&format!("Table '{table_name}' is deleted"));
        Ok(())
    }

    /// Describe `table_name` until `done` yields a value, sleeping between polls
    async fn poll_table<T, F>(&self, table_name: &str, done: F) -> StoreResult<T>
    where
        F: Fn(Option<TableDescription>) -> Option<T>,
    {
        let interval = self.config.wait_poll_interval();
        let max_polls = self.config.wait_max_polls().max(1);
        let start = Instant::now();

        for poll in 1..=max_polls {
            if let Some(value) = done(self.describe_table(table_name).await?) {
                return Ok(value);
            }
            if poll < max_polls {
                tokio::time::sleep(interval).await;
            }
        }

        self.rejected(StoreError::Timeout {
            table: table_name.to_string(),
            waited: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ClientConfig;
    use crate::logging::RecordingLogger;
    use crate::model::{KeySchema, ScalarType, TableDefinition, TableStatus};
    use crate::store::MemoryStore;
    use crate::table_client::TableClient;
    use crate::common::errors::StoreError;
    use claims::assert_matches;
    use std::sync::Arc;
    use std::time::Duration;

    fn definition() -> TableDefinition {
        TableDefinition::new(
            "events",
            KeySchema::partition("tenant", ScalarType::S).with_sort("seq", ScalarType::N),
        )
    }

    fn client(store: Arc<MemoryStore>, max_polls: u32) -> (TableClient, RecordingLogger) {
        let logger = RecordingLogger::default();
        let client = TableClient::with_logger(
            store,
            ClientConfig::new().with_wait(500, max_polls),
            Arc::new(logger.clone()),
        )
        .unwrap();
        (client, logger)
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_creation_to_finish() {
        let store = Arc::new(MemoryStore::new().with_creation_polls(3));
        let (client, _) = client(store.clone(), 10);

        let created = client.create_table(&definition()).await.unwrap();
        assert_eq!(created.status, TableStatus::Creating);

        let start = tokio::time::Instant::now();
        let active = client.wait_until_active("events").await.unwrap();

        assert!(active.is_active());
        assert_eq!(store.describe_calls(), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_polls() {
        let store = Arc::new(MemoryStore::new().with_creation_polls(100));
        let (client, logger) = client(store.clone(), 3);
        client.create_table(&definition()).await.unwrap();

        let err = client.wait_until_active("events").await.unwrap_err();

        assert_matches!(err, StoreError::Timeout { waited, .. } if waited == Duration::from_secs(1));
        assert_eq!(store.describe_calls(), 3);
        assert!(logger.contains("Timed out"));
    }

    #[tokio::test]
    async fn delete_then_wait_until_deleted() {
        let store = Arc::new(MemoryStore::new());
        let (client, _) = client(store, 5);
        client.create_table(&definition()).await.unwrap();

        client.delete_table("events").await.unwrap();
        client.wait_until_deleted("events").await.unwrap();
        assert!(client.describe_table("events").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_key_names_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (client, _) = client(store.clone(), 5);
        let bad = TableDefinition::new(
            "events",
            KeySchema::partition("id", ScalarType::S).with_sort("id", ScalarType::N),
        );

        assert!(client.create_table(&bad).await.unwrap_err().is_invalid_argument());
        assert_eq!(store.item_count("events"), None);
    }
}
