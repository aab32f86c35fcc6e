//! Bounded retry with exponential backoff for external capability calls.

use docanchor_core::{AppResult, RetryPolicy};
use std::future::Future;

/// Run `operation` until it succeeds, the error is not transient, or the
/// attempt budget is spent. Only `AppError::is_transient` errors are retried;
/// the schedule comes from the policy.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut operation: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if !err.is_transient() || attempt >= policy.max_attempts.max(1) {
                    return Err(err);
                }

                let backoff = policy.backoff(attempt);
                tracing::warn!(
                    op = op_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
