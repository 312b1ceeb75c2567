pub mod errors;
pub mod rate_limiter;

pub use errors::{
    BackendError, BackendResult, ErrorContext, StoreError, StoreOperation, StoreResult,
};
pub use rate_limiter::{RateLimitError, RateLimiter, RateLimiterConfig};
