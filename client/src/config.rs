//! Client configuration.
//!
//! Every field is optional; accessors fall back to the defaults listed on each
//! field. A config can be deserialized from any serde format, built in code, or
//! read from `TABLEKIT_*` environment variables.

use crate::bulk_operations::{BackoffPolicy, ReconcileConfig};
use crate::common::errors::{StoreError, StoreResult};
use crate::common::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::model::MAX_CHUNK_SIZE;
use crate::store::HttpStoreConfig;
use crate::utils::env::{EnvUtils, EnvVarError};
use serde::Deserialize;
use std::time::Duration;

const ENV_PREFIX: &str = "TABLEKIT_";

/// Configuration for [`TableClient`](crate::table_client::TableClient) and
/// [`HttpStoreClient`](crate::store::HttpStoreClient).
///
/// # Examples
///
/// ```no_run
/// use tablekit::config::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(r#"{
///     "endpoint": "http://localhost:8000",
///     "backoff_base_ms": 50,
///     "backoff_max_attempts": 8
/// }"#).unwrap();
///
/// assert_eq!(config.chunk_size(), 25);
/// assert_eq!(config.backoff_policy().max_attempts, Some(8));
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Store endpoint for the HTTP transport (no default)
    endpoint: Option<String>,
    /// HTTP request timeout in seconds (default: 30)
    request_timeout_secs: Option<u64>,
    /// Log request/response bodies at debug level (default: false)
    log_transport: Option<bool>,
    /// Operations per bulk request (default: 25, clamped to 1..=25)
    chunk_size: Option<usize>,
    /// Chunks in flight at once per reconciliation (default: unlimited)
    max_in_flight_chunks: Option<usize>,
    /// Delay before the first retry of unprocessed entries in ms (default: 100)
    backoff_base_ms: Option<u64>,
    /// Attempts per chunk before giving up (default: unlimited)
    backoff_max_attempts: Option<u32>,
    /// Ceiling for a single retry delay in ms (default: none)
    backoff_max_delay_ms: Option<u64>,
    /// Items per scan page (default: store decides)
    scan_page_size: Option<u32>,
    /// Interval between table status polls in ms (default: 1000)
    wait_poll_interval_ms: Option<u64>,
    /// Status polls before giving up (default: 60)
    wait_max_polls: Option<u32>,
    /// Client-side request rate limit (default: none)
    rate_limit: Option<RateLimiterConfig>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every setting from `TABLEKIT_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// [`EnvVarError::Invalid`] when a variable is set to a value of the wrong type.
    pub fn from_env() -> Result<Self, EnvVarError> {
        let var = |suffix: &str| format!("{ENV_PREFIX}{suffix}");

        let rate_limit = EnvUtils::get_optional_parsed::<u32>(&var("RATE_LIMIT_RPS"))?
            .map(|requests_per_second| -> Result<_, EnvVarError> {
                Ok(RateLimiterConfig {
                    requests_per_second,
                    burst_size: EnvUtils::get_optional_parsed(&var("RATE_LIMIT_BURST"))?,
                })
            })
            .transpose()?;

        Ok(Self {
            endpoint: EnvUtils::get_optional_var(&var("ENDPOINT")),
            request_timeout_secs: EnvUtils::get_optional_parsed(&var("REQUEST_TIMEOUT_SECS"))?,
            log_transport: EnvUtils::get_optional_bool(&var("LOG_TRANSPORT"))?,
            chunk_size: EnvUtils::get_optional_parsed(&var("CHUNK_SIZE"))?,
            max_in_flight_chunks: EnvUtils::get_optional_parsed(&var("MAX_IN_FLIGHT_CHUNKS"))?,
            backoff_base_ms: EnvUtils::get_optional_parsed(&var("BACKOFF_BASE_MS"))?,
            backoff_max_attempts: EnvUtils::get_optional_parsed(&var("BACKOFF_MAX_ATTEMPTS"))?,
            backoff_max_delay_ms: EnvUtils::get_optional_parsed(&var("BACKOFF_MAX_DELAY_MS"))?,
            scan_page_size: EnvUtils::get_optional_parsed(&var("SCAN_PAGE_SIZE"))?,
            wait_poll_interval_ms: EnvUtils::get_optional_parsed(&var("WAIT_POLL_INTERVAL_MS"))?,
            wait_max_polls: EnvUtils::get_optional_parsed(&var("WAIT_MAX_POLLS"))?,
            rate_limit,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_max_in_flight_chunks(mut self, max_in_flight_chunks: usize) -> Self {
        self.max_in_flight_chunks = Some(max_in_flight_chunks);
        self
    }

    pub fn with_backoff(mut self, base_ms: u64, max_attempts: Option<u32>, max_delay_ms: Option<u64>) -> Self {
        self.backoff_base_ms = Some(base_ms);
        self.backoff_max_attempts = max_attempts;
        self.backoff_max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_scan_page_size(mut self, scan_page_size: u32) -> Self {
        self.scan_page_size = Some(scan_page_size);
        self
    }

    pub fn with_wait(mut self, poll_interval_ms: u64, max_polls: u32) -> Self {
        self.wait_poll_interval_ms = Some(poll_interval_ms);
        self.wait_max_polls = Some(max_polls);
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimiterConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn with_log_transport(mut self, enabled: bool) -> Self {
        self.log_transport = Some(enabled);
        self
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(30))
    }

    pub fn log_transport(&self) -> bool {
        self.log_transport.unwrap_or(false)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
            .unwrap_or(MAX_CHUNK_SIZE)
            .clamp(1, MAX_CHUNK_SIZE)
    }

    pub fn max_in_flight_chunks(&self) -> Option<usize> {
        self.max_in_flight_chunks
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        let mut policy = BackoffPolicy::new(Duration::from_millis(self.backoff_base_ms.unwrap_or(100)));
        if let Some(max_attempts) = self.backoff_max_attempts {
            policy = policy.with_max_attempts(max_attempts);
        }
        if let Some(max_delay_ms) = self.backoff_max_delay_ms {
            policy = policy.with_max_delay(Duration::from_millis(max_delay_ms));
        }
        policy
    }

    pub fn scan_page_size(&self) -> Option<u32> {
        self.scan_page_size
    }

    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms.unwrap_or(1000))
    }

    pub fn wait_max_polls(&self) -> u32 {
        self.wait_max_polls.unwrap_or(60)
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig::default()
            .with_chunk_size(self.chunk_size())
            .with_max_in_flight_chunks(self.max_in_flight_chunks)
            .with_backoff(self.backoff_policy())
    }

    /// Build the configured rate limiter, if any
    pub fn rate_limiter(&self) -> StoreResult<Option<RateLimiter>> {
        self.rate_limit
            .as_ref()
            .map(RateLimiterConfig::build)
            .transpose()
    }

    /// Settings for [`HttpStoreClient`](crate::store::HttpStoreClient).
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidArgument`] when no endpoint is configured.
    pub fn http_store_config(&self) -> StoreResult<HttpStoreConfig> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| StoreError::invalid("no store endpoint configured"))?;

        Ok(HttpStoreConfig::new(endpoint)
            .with_timeout(self.request_timeout())
            .with_log_transport(self.log_transport()))
    }
}
