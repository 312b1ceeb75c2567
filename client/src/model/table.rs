use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scalar type of a key attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    S,
    N,
    B,
}

/// One attribute of a table's primary key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub scalar_type: ScalarType,
}

impl KeyAttribute {
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
        }
    }
}

/// Primary key schema: a partition key and an optional sort key.
///
/// # Examples
///
/// ```no_run
/// use tablekit::model::{KeySchema, ScalarType};
///
/// let schema = KeySchema::partition("tenant", ScalarType::S).with_sort("created", ScalarType::N);
/// assert_eq!(schema.attribute_names(), vec!["tenant".to_string(), "created".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
}

impl KeySchema {
    pub fn partition(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            partition_key: KeyAttribute::new(name, scalar_type),
            sort_key: None,
        }
    }

    pub fn with_sort(mut self, name: impl Into<String>, scalar_type: ScalarType) -> Self {
        self.sort_key = Some(KeyAttribute::new(name, scalar_type));
        self
    }

    /// Key attribute names in key order (partition first)
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes().map(|a| a.name.clone()).collect()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &KeyAttribute> {
        std::iter::once(&self.partition_key).chain(self.sort_key.iter())
    }
}

/// Everything needed to create a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub key_schema: KeySchema,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, key_schema: KeySchema) -> Self {
        Self {
            name: name.into(),
            key_schema,
        }
    }
}

/// Lifecycle status reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableStatus {
    Creating,
    Active,
    Updating,
    Deleting,
    #[default]
    Unknown,
}

impl TableStatus {
    pub fn from_wire(status: &str) -> Self {
        match status {
            "CREATING" => TableStatus::Creating,
            "ACTIVE" => TableStatus::Active,
            "UPDATING" => TableStatus::Updating,
            "DELETING" => TableStatus::Deleting,
            _ => TableStatus::Unknown,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            TableStatus::Creating => "CREATING",
            TableStatus::Active => "ACTIVE",
            TableStatus::Updating => "UPDATING",
            TableStatus::Deleting => "DELETING",
            TableStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Result of describing a table
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescription {
    pub name: String,
    pub status: TableStatus,
    pub key_schema: KeySchema,
    pub item_count: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TableDescription {
    pub fn is_active(&self) -> bool {
        self.status == TableStatus::Active
    }
}
