use crate::common::errors::{BackendError, BackendResult};
use crate::model::{
    BulkWriteResponse, Cursor, Item, KeyAttribute, KeySchema, Operation, ScalarType, ScanPage,
    TableDefinition, TableDescription, TableStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemRequest {
    pub request_items: HashMap<String, Vec<WriteRequest>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemResponse {
    #[serde(default)]
    pub unprocessed_items: HashMap<String, Vec<WriteRequest>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteRequest {
    PutRequest {
        #[serde(rename = "Item")]
        item: Item,
    },
    DeleteRequest {
        #[serde(rename = "Key")]
        key: Item,
    },
}

impl From<&Operation> for WriteRequest {
    fn from(operation: &Operation) -> Self {
        match operation {
            Operation::Write(item) => WriteRequest::PutRequest { item: item.clone() },
            Operation::Delete(key) => WriteRequest::DeleteRequest { key: key.clone() },
        }
    }
}

impl From<WriteRequest> for Operation {
    fn from(request: WriteRequest) -> Self {
        match request {
            WriteRequest::PutRequest { item } => Operation::Write(item),
            WriteRequest::DeleteRequest { key } => Operation::Delete(key),
        }
    }
}

impl BatchWriteItemRequest {
    pub fn new(table_name: &str, operations: &[Operation]) -> Self {
        let requests = operations.iter().map(WriteRequest::from).collect();
        Self {
            request_items: HashMap::from([(table_name.to_string(), requests)]),
        }
    }
}

impl BatchWriteItemResponse {
    /// Unprocessed entries for `table_name`; entries for other tables are ignored
    pub fn into_response(mut self, table_name: &str) -> BulkWriteResponse {
        BulkWriteResponse {
            unprocessed: self
                .unprocessed_items
                .remove(table_name)
                .unwrap_or_default()
                .into_iter()
                .map(Operation::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanRequest {
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_start_key: Option<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanResponse {
    #[serde(default)]
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}

impl From<ScanResponse> for ScanPage {
    fn from(response: ScanResponse) -> Self {
        ScanPage {
            items: response.items,
            next_cursor: response
                .last_evaluated_key
                .filter(|key| !key.is_empty())
                .map(Cursor::from_key),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyRequest {
    pub table_name: String,
    pub key: Item,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemResponse {
    pub item: Option<Item>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: Item,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableNameRequest {
    pub table_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    pub attribute_name: String,
    /// `HASH` or `RANGE`
    pub key_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: ScalarType,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTableRequest {
    pub table_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub billing_mode: &'static str,
}

impl From<&TableDefinition> for CreateTableRequest {
    fn from(definition: &TableDefinition) -> Self {
        let schema = &definition.key_schema;
        let key_types = std::iter::once("HASH").chain(std::iter::once("RANGE"));

        Self {
            table_name: definition.name.clone(),
            key_schema: schema
                .attributes()
                .zip(key_types)
                .map(|(attribute, key_type)| KeySchemaElement {
                    attribute_name: attribute.name.clone(),
                    key_type: key_type.to_string(),
                })
                .collect(),
            attribute_definitions: schema
                .attributes()
                .map(|attribute| AttributeDefinition {
                    attribute_name: attribute.name.clone(),
                    attribute_type: attribute.scalar_type,
                })
                .collect(),
            billing_mode: "PAY_PER_REQUEST",
        }
    }
}

/// `TableDescription` object of CreateTable and DescribeTable responses
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireTableDescription {
    pub table_name: String,
    #[serde(default)]
    pub table_status: String,
    #[serde(default)]
    pub key_schema: Vec<KeySchemaElement>,
    #[serde(default)]
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub item_count: Option<u64>,
    /// Seconds since the epoch
    pub creation_date_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTableResponse {
    pub table_description: WireTableDescription,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeTableResponse {
    pub table: WireTableDescription,
}

impl TryFrom<WireTableDescription> for TableDescription {
    type Error = BackendError;

    fn try_from(wire: WireTableDescription) -> BackendResult<Self> {
        let attribute_for = |key_type: &str| -> Option<KeyAttribute> {
            let element = wire.key_schema.iter().find(|e| e.key_type == key_type)?;
            let scalar_type = wire
                .attribute_definitions
                .iter()
                .find(|d| d.attribute_name == element.attribute_name)
                .map(|d| d.attribute_type)
                .unwrap_or(ScalarType::S);
            Some(KeyAttribute::new(element.attribute_name.clone(), scalar_type))
        };

        let partition_key = attribute_for("HASH").ok_or_else(|| {
            BackendError::new(
                "SerializationException",
                format!("table '{}' description has no HASH key", wire.table_name),
            )
        })?;
        let sort_key = attribute_for("RANGE");

        Ok(TableDescription {
            status: TableStatus::from_wire(&wire.table_status),
            key_schema: KeySchema {
                partition_key,
                sort_key,
            },
            item_count: wire.item_count,
            created_at: wire.creation_date_time.and_then(epoch_to_datetime),
            name: wire.table_name,
        })
    }
}

fn epoch_to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    let whole = seconds.trunc() as i64;
    let nanos = ((seconds - seconds.trunc()) * 1e9).round() as u32;
    DateTime::from_timestamp(whole, nanos.min(999_999_999))
}

/// Error body returned with non-2xx responses
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "__type")]
    pub error_type: Option<String>,
    #[serde(alias = "Message")]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Error code without the namespace prefix
    /// (`com.amazonaws.dynamodb.v20120810#ResourceNotFoundException` becomes
    /// `ResourceNotFoundException`)
    pub fn code(&self) -> Option<&str> {
        self.error_type
            .as_deref()
            .map(|t| t.rsplit('#').next().unwrap_or(t))
    }
}
