use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The store call an error was raised from.
///
/// Used to wrap [`BackendError`]s with enough context to tell which request
/// failed without inspecting the backend message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    BulkWrite,
    BulkDelete,
    ReadPage,
    GetItem,
    PutItem,
    DeleteItem,
    CreateTable,
    DeleteTable,
    DescribeTable,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOperation::BulkWrite => "bulk_write",
            StoreOperation::BulkDelete => "bulk_delete",
            StoreOperation::ReadPage => "read_page",
            StoreOperation::GetItem => "get_item",
            StoreOperation::PutItem => "put_item",
            StoreOperation::DeleteItem => "delete_item",
            StoreOperation::CreateTable => "create_table",
            StoreOperation::DeleteTable => "delete_table",
            StoreOperation::DescribeTable => "describe_table",
        };
        f.write_str(name)
    }
}

/// An error reported by a [`StoreClient`](crate::store::StoreClient) implementation.
///
/// Carries the store's own error code and message, plus the HTTP status and
/// request id when the transport has them.
///
/// # Examples
///
/// ```no_run
/// use tablekit::common::BackendError;
///
/// let err = BackendError::new("ProvisionedThroughputExceededException", "slow down")
///     .with_status(400)
///     .with_request_id("R123");
/// assert!(err.is_throttling());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}{}", .request_id.as_ref().map(|id| format!(" [Request ID: {id}]")).unwrap_or_default())]
pub struct BackendError {
    /// Store error code (e.g. `ResourceNotFoundException`)
    pub code: String,
    /// Human-readable message from the store
    pub message: String,
    /// HTTP status code, when the failure came over HTTP
    pub status: Option<u16>,
    /// Store request id for tracing the call on the server side
    pub request_id: Option<String>,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
            request_id: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Whether the store rejected the call for capacity reasons.
    ///
    /// The core never retries these on its own; only unprocessed entries of a
    /// successful bulk write are retried.
    pub fn is_throttling(&self) -> bool {
        matches!(
            self.code.as_str(),
            "ProvisionedThroughputExceededException"
                | "ThrottlingException"
                | "RequestLimitExceeded"
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.code == "ResourceNotFoundException"
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            "TransportTimeout"
        } else if err.is_connect() {
            "TransportConnect"
        } else {
            "TransportError"
        };
        let mut backend = BackendError::new(code, err.to_string());
        if let Some(status) = err.status() {
            backend.status = Some(status.as_u16());
        }
        backend
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::new("SerializationException", err.to_string())
    }
}

/// Errors surfaced by the client library.
///
/// # Error Categories
///
/// - [`InvalidArgument`] - rejected before any store call, never retried
/// - [`TransientCapacityExceeded`] - a bounded backoff policy ran out of attempts
/// - [`BackendFailure`] - a store call failed; wrapped with table and operation
/// - [`Cancelled`] - the caller's cancellation token fired
/// - [`Timeout`] - polling for a table state gave up
///
/// # Examples
///
/// ```no_run
/// use tablekit::common::StoreError;
///
/// fn report(error: &StoreError) {
///     match error {
///         StoreError::InvalidArgument(reason) => eprintln!("fix the request: {reason}"),
///         StoreError::BackendFailure { table, operation, source } => {
///             eprintln!("{operation} on {table} failed: {source}");
///         }
///         other => eprintln!("{other}"),
///     }
/// }
/// ```
///
/// [`InvalidArgument`]: StoreError::InvalidArgument
/// [`TransientCapacityExceeded`]: StoreError::TransientCapacityExceeded
/// [`BackendFailure`]: StoreError::BackendFailure
/// [`Cancelled`]: StoreError::Cancelled
/// [`Timeout`]: StoreError::Timeout
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed input: bad table name, empty or mixed-kind operation list,
    /// empty item or key, missing key attributes.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unprocessed entries remained after the configured maximum number of
    /// attempts.
    ///
    /// Only raised when the backoff policy has `max_attempts` set; the default
    /// policy keeps retrying.
    #[error(
        "Capacity exceeded on table '{table}': {unprocessed} operations still unprocessed after {attempts} attempts"
    )]
    TransientCapacityExceeded {
        table: String,
        unprocessed: usize,
        attempts: u32,
    },

    /// A store call returned an error.
    #[error("Backend failure during {operation} on table '{table}': {source}")]
    BackendFailure {
        table: String,
        operation: StoreOperation,
        #[source]
        source: BackendError,
    },

    /// The operation was cancelled through its cancellation token.
    #[error("Operation {operation} was cancelled")]
    Cancelled { operation: StoreOperation },

    /// A wait-until-ready poll gave up.
    #[error("Timed out after {waited:?} waiting for table '{table}'")]
    Timeout { table: String, waited: Duration },
}

impl StoreError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        StoreError::InvalidArgument(reason.into())
    }

    pub fn backend(table: &str, operation: StoreOperation, source: BackendError) -> Self {
        StoreError::BackendFailure {
            table: table.to_string(),
            operation,
            source,
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, StoreError::InvalidArgument(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StoreError::Cancelled { .. })
    }

    /// The underlying backend error, if this is a [`StoreError::BackendFailure`].
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            StoreError::BackendFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result alias for library operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for raw store calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Helper trait for attaching table/operation context to raw store results
pub trait ErrorContext<T> {
    /// Wrap a backend error as [`StoreError::BackendFailure`]
    fn with_operation(self, table: &str, operation: StoreOperation) -> StoreResult<T>;
}

impl<T> ErrorContext<T> for BackendResult<T> {
    fn with_operation(self, table: &str, operation: StoreOperation) -> StoreResult<T> {
        self.map_err(|source| StoreError::backend(table, operation, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_display_includes_request_id() {
        let err = BackendError::new("ValidationException", "bad key").with_request_id("abc");
        assert_eq!(
            err.to_string(),
            "ValidationException: bad key [Request ID: abc]"
        );

        let err = BackendError::new("ValidationException", "bad key");
        assert_eq!(err.to_string(), "ValidationException: bad key");
    }

    #[test]
    fn with_operation_wraps_context() {
        let result: BackendResult<()> = Err(BackendError::new("AccessDenied", "nope"));
        let err = result
            .with_operation("orders", StoreOperation::BulkDelete)
            .unwrap_err();

        assert!(matches!(
            &err,
            StoreError::BackendFailure { table, operation: StoreOperation::BulkDelete, .. }
                if table == "orders"
        ));
        assert_eq!(err.backend_error().map(|e| e.code.as_str()), Some("AccessDenied"));
        assert!(err.to_string().contains("bulk_delete"));
    }

    #[test]
    fn throttling_codes_are_recognised() {
        assert!(BackendError::new("ThrottlingException", "").is_throttling());
        assert!(!BackendError::new("ValidationException", "").is_throttling());
        assert!(BackendError::new("ResourceNotFoundException", "").is_not_found());
    }
}
