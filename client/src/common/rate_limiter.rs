use super::errors::{StoreError, StoreResult};
use governor::{
    Quota, RateLimiter as GovernorRateLimiter,
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Client-side pacing for store calls.
///
/// Shared by every chunk of a reconciliation and every page of a purge; each
/// store call takes one permit.
pub struct RateLimiter {
    inner: Arc<GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a new rate limiter with specified requests per second
    pub fn new(requests_per_second: NonZeroU32) -> Self {
        Self::with_quota(Quota::per_second(requests_per_second))
    }

    /// Create a rate limiter with custom quota
    pub fn with_quota(quota: Quota) -> Self {
        Self {
            inner: Arc::new(GovernorRateLimiter::direct(quota)),
        }
    }

    /// Check if a request can proceed right now
    pub fn check(&self) -> Result<(), RateLimitError> {
        match self.inner.check() {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait_duration = not_until.wait_time_from(DefaultClock::default().now());
                Err(RateLimitError::TooManyRequests {
                    retry_after: wait_duration,
                })
            }
        }
    }

    /// Wait until a request can proceed
    pub async fn wait_until_ready(&self) {
        self.inner.until_ready().await;
    }
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Rate limiting errors
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests { retry_after: Duration },
}

/// Rate limiter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimiterConfig {
    /// Maximum requests per second
    pub requests_per_second: u32,
    /// Maximum burst size (defaults to requests_per_second)
    pub burst_size: Option<u32>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: None,
        }
    }
}

impl RateLimiterConfig {
    /// Create a rate limiter from this configuration
    pub fn build(&self) -> StoreResult<RateLimiter> {
        let rate = NonZeroU32::new(self.requests_per_second)
            .ok_or_else(|| StoreError::invalid("requests_per_second must be > 0"))?;
        let burst = NonZeroU32::new(self.burst_size.unwrap_or(self.requests_per_second))
            .ok_or_else(|| StoreError::invalid("burst_size must be > 0"))?;

        Ok(RateLimiter::with_quota(
            Quota::per_second(rate).allow_burst(burst),
        ))
    }
}
