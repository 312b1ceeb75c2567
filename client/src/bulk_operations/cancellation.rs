use crate::common::errors::{StoreError, StoreOperation, StoreResult};
use crate::common::rate_limiter::RateLimiter;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run `future` unless `token` is already cancelled, racing it against the token.
pub async fn run_cancellable<F, T>(
    token: &CancellationToken,
    operation: StoreOperation,
    future: F,
) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    if token.is_cancelled() {
        return Err(StoreError::Cancelled { operation });
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(StoreError::Cancelled { operation }),
        result = future => result,
    }
}

/// Sleep for `delay`, returning early with `Cancelled` when the token fires.
///
/// The token is checked even for a zero delay.
pub async fn sleep_cancellable(
    token: &CancellationToken,
    operation: StoreOperation,
    delay: Duration,
) -> StoreResult<()> {
    if token.is_cancelled() {
        return Err(StoreError::Cancelled { operation });
    }
    if delay.is_zero() {
        return Ok(());
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(StoreError::Cancelled { operation }),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Wait for a rate limiter permit, if there is a limiter
pub async fn acquire_permit(
    limiter: Option<&RateLimiter>,
    token: &CancellationToken,
    operation: StoreOperation,
) -> StoreResult<()> {
    match limiter {
        Some(limiter) => {
            run_cancellable(token, operation, async {
                limiter.wait_until_ready().await;
                Ok(())
            })
            .await
        }
        None => Ok(()),
    }
}
