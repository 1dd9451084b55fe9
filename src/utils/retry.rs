use std::time::Duration;

use tokio::time::sleep;

// ============================================================================
// Conflict Retry
// ============================================================================
//
// Optimistic-concurrency conflicts are expected under contention: the caller
// re-reads fresh state and tries again. Only errors marked transient are
// retried; business rule failures surface immediately.
//
// ============================================================================

/// Marks errors that are safe to retry with fresh state.
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Run `operation` up to `max_attempts` times, retrying only transient
/// failures with a short pause between attempts.
pub async fn retry_on_conflict<F, Fut, T, E>(max_attempts: u32, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "operation succeeded after conflict retry");
                }
                return Ok(value);
            }
            Err(error) if error.is_transient() && attempt < max_attempts => {
                tracing::debug!(
                    attempt,
                    error = %error,
                    "transient conflict, retrying with fresh state"
                );
                sleep(Duration::from_millis(25)).await;
            }
            Err(error) => return Err(error),
        }
    }
}
