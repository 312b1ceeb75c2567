//! # tablekit
//!
//! Client library for DynamoDB-style key-value/document stores. It adds
//! validation, injected logging, paginated scans and bulk writes that retry
//! unprocessed entries with exponential backoff until the store has applied
//! them.
//!
//! ## Modules
//!
//! - [`bulk_operations`] - Chunked, retried bulk writes/deletes and table purges
//! - [`common`] - Error types and rate limiting
//! - [`config`] - Client configuration and environment loading
//! - [`logging`] - Logger capability injected into every component
//! - [`model`] - Attribute values, items, operations and table metadata
//! - [`store`] - Store capability trait with HTTP and in-memory implementations
//! - [`table_client`] - Validated facade over a store
//! - [`utils`] - Utility functions and helpers
//! - [`validation`] - Input validators

pub mod bulk_operations;
pub mod common;
pub mod config;
pub mod logging;
pub mod model;
pub mod store;
pub mod table_client;
pub mod utils;
pub mod validation;
