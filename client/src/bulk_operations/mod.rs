//! Bulk operations module: chunked, retried bulk writes and table purges
//!
//! This module holds the two procedures everything else builds on:
//!
//! - `types`: Backoff policy, reconciler configuration and settled results
//! - `cancellation`: Cancellation-aware waits around store calls and delays
//! - `reconciler`: Chunked bulk writes/deletes retried until every entry is applied
//! - `purger`: Page-by-page deletion of every item in a table

pub mod cancellation;
pub mod purger;
pub mod reconciler;
pub mod types;

// Re-export the main types and components
pub use purger::{TablePurger, project_key};
pub use reconciler::BulkReconciler;
pub use types::{BackoffPolicy, ReconcileConfig, ReconcileReport, SettledChunk};

// Re-export cancellation utilities
pub use cancellation::{run_cancellable, sleep_cancellable};
