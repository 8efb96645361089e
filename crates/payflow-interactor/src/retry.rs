//! Retrying fallible service calls with a [`RetryStrategy`].

use payflow_core::{PaymentResult, RetryStrategy};
use std::future::Future;
use tokio::time::sleep;
use tracing::warn;

/// Run `operation`, retrying retryable failures up to `strategy.max_retries`
/// times with the strategy's delays in between.
pub async fn retry_with<T, F, Fut>(strategy: &RetryStrategy, mut operation: F) -> PaymentResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PaymentResult<T>>,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(failure) if failure.is_retryable() && retry < strategy.max_retries => {
                let delay = strategy.interval(retry);
                warn!(%failure, retry, ?delay, "retryable failure, trying again");
                sleep(delay).await;
                retry += 1;
            }
            Err(failure) => return Err(failure),
        }
    }
}
