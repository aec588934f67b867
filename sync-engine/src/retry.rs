//! Retrying async steps with [`RetryPolicy`].

use std::future::Future;
use sync_core::RetryPolicy;

use crate::SyncError;

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let mut failures = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                failures += 1;
                if !policy.should_retry(failures) {
                    tracing::error!("{} failed after {} attempts: {}", what, failures, e);
                    return Err(e);
                }
                let delay = policy.delay();
                tracing::warn!("{} failed (attempt {}), retrying in {:?}: {}", what, failures, delay, e);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2))
    }

    #[tokio::test]
    async fn retries_transient_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(&policy(), "op", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SyncError::Store(StoreError::Unavailable("timeout".into())))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_retry(&policy(), "op", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::Store(StoreError::Unavailable("timeout".into())))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_retry(&policy(), "op", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::Metadata("missing".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
