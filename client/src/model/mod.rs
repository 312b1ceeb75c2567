//! Data model for items, keys and bulk operations.
//!
//! Attribute values serialize to the store's tagged JSON form
//! (`{"S": "x"}`, `{"N": "1"}`, `{"BOOL": true}` ...), so the same types are
//! used by callers and on the wire.

use crate::common::errors::{StoreError, StoreOperation, StoreResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

pub mod table;

pub use table::{
    KeyAttribute, KeySchema, ScalarType, TableDefinition, TableDescription, TableStatus,
};

/// Maximum number of operations the store accepts in one bulk-write request.
pub const MAX_CHUNK_SIZE: usize = 25;

/// An item or key: attribute name to value.
pub type Item = HashMap<String, AttributeValue>;

/// A typed attribute value as stored by the backend.
///
/// # Examples
///
/// ```no_run
/// use tablekit::model::AttributeValue;
///
/// let name = AttributeValue::from("widget");
/// let price = AttributeValue::from(42);
/// assert_eq!(serde_json::to_string(&price).unwrap(), r#"{"N":"42"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireAttributeValue", into = "WireAttributeValue")]
pub enum AttributeValue {
    /// String
    S(String),
    /// Number, kept as its decimal representation
    N(String),
    /// Binary
    B(Vec<u8>),
    /// Boolean
    Bool(bool),
    /// Null
    Null,
    /// List of values
    L(Vec<AttributeValue>),
    /// Nested map
    M(Item),
}

/// Tagged representation used on the wire.
#[derive(Serialize, Deserialize)]
enum WireAttributeValue {
    S(String),
    N(String),
    B(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    L(Vec<AttributeValue>),
    M(HashMap<String, AttributeValue>),
}

impl TryFrom<WireAttributeValue> for AttributeValue {
    type Error = String;

    fn try_from(value: WireAttributeValue) -> Result<Self, Self::Error> {
        Ok(match value {
            WireAttributeValue::S(s) => AttributeValue::S(s),
            WireAttributeValue::N(n) => AttributeValue::N(n),
            WireAttributeValue::B(encoded) => AttributeValue::B(
                BASE64
                    .decode(encoded.as_bytes())
                    .map_err(|e| format!("invalid base64 in binary attribute: {e}"))?,
            ),
            WireAttributeValue::Bool(b) => AttributeValue::Bool(b),
            WireAttributeValue::Null(true) => AttributeValue::Null,
            WireAttributeValue::Null(false) => {
                return Err("NULL attribute must be true".to_string());
            }
            WireAttributeValue::L(values) => AttributeValue::L(values),
            WireAttributeValue::M(map) => AttributeValue::M(map),
        })
    }
}

impl From<AttributeValue> for WireAttributeValue {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::S(s) => WireAttributeValue::S(s),
            AttributeValue::N(n) => WireAttributeValue::N(n),
            AttributeValue::B(bytes) => WireAttributeValue::B(BASE64.encode(bytes)),
            AttributeValue::Bool(b) => WireAttributeValue::Bool(b),
            AttributeValue::Null => WireAttributeValue::Null(true),
            AttributeValue::L(values) => WireAttributeValue::L(values),
            AttributeValue::M(map) => WireAttributeValue::M(map),
        }
    }
}

impl AttributeValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            AttributeValue::N(n) => Some(n),
            _ => None,
        }
    }

    /// Convert to a plain JSON value.
    ///
    /// Numbers become JSON numbers when they parse as one, binary becomes a
    /// base64 string.
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::S(s) => Value::String(s.clone()),
            AttributeValue::N(n) => n
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| n.parse::<u64>().map(Value::from))
                .ok()
                .or_else(|| {
                    n.parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                })
                .unwrap_or_else(|| Value::String(n.clone())),
            AttributeValue::B(bytes) => Value::String(BASE64.encode(bytes)),
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Null => Value::Null,
            AttributeValue::L(values) => Value::Array(values.iter().map(Self::to_json).collect()),
            AttributeValue::M(map) => item_to_json(map),
        }
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(b),
            Value::Number(n) => AttributeValue::N(n.to_string()),
            Value::String(s) => AttributeValue::S(s),
            Value::Array(values) => {
                AttributeValue::L(values.into_iter().map(AttributeValue::from).collect())
            }
            Value::Object(map) => AttributeValue::M(
                map.into_iter()
                    .map(|(k, v)| (k, AttributeValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::S(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::S(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        AttributeValue::B(value)
    }
}

impl From<Item> for AttributeValue {
    fn from(value: Item) -> Self {
        AttributeValue::M(value)
    }
}

macro_rules! number_attribute {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for AttributeValue {
                fn from(value: $ty) -> Self {
                    AttributeValue::N(value.to_string())
                }
            }
        )*
    };
}

number_attribute!(i32, i64, u32, u64, usize, f64);

/// Build an item from a plain JSON object.
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] when `value` is not a JSON object.
pub fn item_from_json(value: Value) -> StoreResult<Item> {
    match value {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (k, AttributeValue::from(v)))
            .collect()),
        other => Err(StoreError::invalid(format!(
            "item must be a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Convert an item to a plain JSON object.
pub fn item_to_json(item: &Item) -> Value {
    Value::Object(
        item.iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Kind of a bulk operation. One reconciliation only ever carries one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Write,
    Delete,
}

impl OperationKind {
    pub fn store_operation(self) -> StoreOperation {
        match self {
            OperationKind::Write => StoreOperation::BulkWrite,
            OperationKind::Delete => StoreOperation::BulkDelete,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Write => f.write_str("write"),
            OperationKind::Delete => f.write_str("delete"),
        }
    }
}

/// A single write or delete targeting one item.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Put the full item, replacing any existing item with the same key
    Write(Item),
    /// Delete the item with this key
    Delete(Item),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Write(_) => OperationKind::Write,
            Operation::Delete(_) => OperationKind::Delete,
        }
    }

    /// The item for a write, the key for a delete
    pub fn payload(&self) -> &Item {
        match self {
            Operation::Write(item) | Operation::Delete(item) => item,
        }
    }
}

/// Opaque continuation token of a paginated read.
///
/// Wraps the store's last evaluated key. Only meaningful for the table and
/// scan it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(Item);

impl Cursor {
    pub fn from_key(key: Item) -> Self {
        Self(key)
    }

    pub fn as_key(&self) -> &Item {
        &self.0
    }

    pub fn into_key(self) -> Item {
        self.0
    }
}

/// One page of a full-table scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    pub items: Vec<Item>,
    /// Present when more pages may follow
    pub next_cursor: Option<Cursor>,
}

impl ScanPage {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Response of a single bulk-write request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteResponse {
    /// Operations the store did not apply in this attempt
    pub unprocessed: Vec<Operation>,
}

impl BulkWriteResponse {
    pub fn complete() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attribute_values_use_tagged_wire_form() {
        let item = item_from_json(json!({
            "id": "a-1",
            "count": 3,
            "active": true,
            "nothing": null,
            "tags": ["x", 2],
            "nested": {"k": "v"}
        }))
        .unwrap();

        let wire = serde_json::to_value(&item).unwrap();
        assert_eq!(wire["id"], json!({"S": "a-1"}));
        assert_eq!(wire["count"], json!({"N": "3"}));
        assert_eq!(wire["active"], json!({"BOOL": true}));
        assert_eq!(wire["nothing"], json!({"NULL": true}));
        assert_eq!(wire["tags"], json!({"L": [{"S": "x"}, {"N": "2"}]}));
        assert_eq!(wire["nested"], json!({"M": {"k": {"S": "v"}}}));

        let back: Item = serde_json::from_value(wire).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn binary_travels_as_base64() {
        let value = AttributeValue::from(vec![0u8, 1, 2, 255]);
        let wire = serde_json::to_string(&value).unwrap();
        assert_eq!(wire, r#"{"B":"AAEC/w=="}"#);

        let decoded: AttributeValue = serde_json::from_str(&wire).unwrap();
        assert_eq!(decoded, value);

        assert!(serde_json::from_str::<AttributeValue>(r#"{"B":"not base64!"}"#).is_err());
        assert!(serde_json::from_str::<AttributeValue>(r#"{"NULL":false}"#).is_err());
    }

    #[test]
    fn non_object_json_is_not_an_item() {
        let err = item_from_json(json!(["a", "b"])).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn json_round_trip_keeps_numbers_numeric() {
        let original = json!({"id": "x", "price": 9.5, "qty": 4, "big": 18446744073709551615u64});
        let item = item_from_json(original.clone()).unwrap();
        assert_eq!(item_to_json(&item), original);
    }

    #[test]
    fn operation_kind_maps_to_store_operation() {
        let op = Operation::Delete(item_from_json(json!({"id": "1"})).unwrap());
        assert_eq!(op.kind(), OperationKind::Delete);
        assert_eq!(op.kind().store_operation(), StoreOperation::BulkDelete);
        assert_eq!(op.payload()["id"], AttributeValue::from("1"));
    }
}
