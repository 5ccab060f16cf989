use parkline_core::StoreError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Bounded retry with doubling backoff for store operations. Infrastructure
/// faults are retried here, at the persistence boundary, and surfaced as
/// `StoreError::Unavailable` once attempts are exhausted. Business outcomes
/// never pass through this path.
pub async fn with_retry<T, F, Fut>(op: &str, mut attempt_fn: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut last_error = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(op, attempt, %err, "store operation failed");
                last_error = err.to_string();
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    Err(StoreError::Unavailable(format!("{op}: {last_error}")))
}

/// Row decode failures are infrastructure faults too; they are not retried.
pub fn decode_err(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry("flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(sqlx::Error::PoolTimedOut)
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_surface_unavailable() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("down", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(sqlx::Error::PoolTimedOut) }
        })
        .await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
