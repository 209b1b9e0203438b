//! Retry with exponential backoff and cancellation.

use std::future::Future;

use localnet_sandbox_types::RetryConfig;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::FetchError;

/// Run `f` until it succeeds, fails permanently, or the retry budget runs out.
///
/// `f` receives the 1-based attempt number. Transient failures sleep for
/// `cfg.backoff_for(attempt)` before the next attempt. A cancellation during
/// an attempt or a backoff abandons the remaining retries.
pub async fn with_retries<T, F, Fut>(
    cfg: RetryConfig,
    cancel: &CancellationToken,
    mut f: F,
) -> Result<T, FetchError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = cfg.max_attempts();
    let mut attempt = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        attempt += 1;

        let result = tokio::select! {
            r = f(attempt) => r,
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        };

        match result {
            Ok(v) => return Ok(v),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                return Err(FetchError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                let backoff = cfg.backoff_for(attempt);
                debug!(attempt, backoff_ms = backoff.as_millis() as u64, error = %e, "retrying");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                }
            }
        }
    }
}
