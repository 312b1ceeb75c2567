//! Input validation run before any store call.
//!
//! Every validator reports [`StoreError::InvalidArgument`]; nothing here is
//! ever retried.

use crate::common::errors::{StoreError, StoreResult};
use crate::model::{Item, Operation, OperationKind};
use std::collections::HashSet;

const MIN_TABLE_NAME_LEN: usize = 3;
const MAX_TABLE_NAME_LEN: usize = 255;
const MAX_ATTRIBUTE_NAME_LEN: usize = 255;

/// Core validation trait shared by the validators in this module.
///
/// # Examples
///
/// ```no_run
/// use tablekit::validation::{TableNameValidator, Validator};
///
/// assert!(TableNameValidator.validate("orders").is_ok());
/// assert!(TableNameValidator.validate("a b").is_err());
/// ```
pub trait Validator<T: ?Sized> {
    /// Validate the input, returning the reason it was rejected
    fn validate(&self, input: &T) -> StoreResult<()>;
}

/// Table names: 3-255 characters from `[A-Za-z0-9_.-]`
pub struct TableNameValidator;

impl Validator<str> for TableNameValidator {
    fn validate(&self, input: &str) -> StoreResult<()> {
        let len = input.chars().count();
        if !(MIN_TABLE_NAME_LEN..=MAX_TABLE_NAME_LEN).contains(&len) {
            return Err(StoreError::invalid(format!(
                "table name must be between {MIN_TABLE_NAME_LEN} and {MAX_TABLE_NAME_LEN} characters, got {len}"
            )));
        }

        if let Some(bad) = input
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(StoreError::invalid(format!(
                "table name '{input}' contains invalid character '{bad}'"
            )));
        }

        Ok(())
    }
}

/// Attribute names: non-empty, at most 255 bytes
pub struct AttributeNameValidator;

impl Validator<str> for AttributeNameValidator {
    fn validate(&self, input: &str) -> StoreResult<()> {
        if input.is_empty() {
            return Err(StoreError::invalid("attribute name must not be empty"));
        }
        if input.len() > MAX_ATTRIBUTE_NAME_LEN {
            return Err(StoreError::invalid(format!(
                "attribute name exceeds {MAX_ATTRIBUTE_NAME_LEN} bytes"
            )));
        }
        Ok(())
    }
}

/// Items and keys must be non-empty maps with valid attribute names
pub struct ItemValidator;

impl Validator<Item> for ItemValidator {
    fn validate(&self, input: &Item) -> StoreResult<()> {
        if input.is_empty() {
            return Err(StoreError::invalid("item or key must not be empty"));
        }
        input
            .keys()
            .try_for_each(|name| AttributeNameValidator.validate(name.as_str()))
    }
}

/// Key attribute name lists: non-empty, valid names, no duplicates
pub struct KeyNamesValidator;

impl Validator<[String]> for KeyNamesValidator {
    fn validate(&self, input: &[String]) -> StoreResult<()> {
        if input.is_empty() {
            return Err(StoreError::invalid(
                "at least one key attribute name is required",
            ));
        }

        let mut seen = HashSet::new();
        for name in input {
            AttributeNameValidator.validate(name.as_str())?;
            if !seen.insert(name.as_str()) {
                return Err(StoreError::invalid(format!(
                    "duplicate key attribute name '{name}'"
                )));
            }
        }
        Ok(())
    }
}

/// Validate a bulk operation list and return its single kind.
///
/// The list must be non-empty, every entry must be the same kind, and every
/// item or key must pass [`ItemValidator`].
pub fn validate_operations(operations: &[Operation]) -> StoreResult<OperationKind> {
    let first = operations
        .first()
        .ok_or_else(|| StoreError::invalid("operation list must not be empty"))?;
    let kind = first.kind();

    for (index, operation) in operations.iter().enumerate() {
        if operation.kind() != kind {
            return Err(StoreError::invalid(format!(
                "operation list mixes kinds: entry {index} is a {} but the list started with a {kind}",
                operation.kind()
            )));
        }
        ItemValidator.validate(operation.payload())?;
    }

    Ok(kind)
}

pub fn validate_table_name(table_name: &str) -> StoreResult<()> {
    TableNameValidator.validate(table_name)
}
