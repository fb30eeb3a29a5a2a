//! Retry policy for transient persistence failures
//!
//! Applied to side-effect-free reads only. Writes are never retried
//! automatically: the create/review operations already carry their own
//! idempotency semantics and a blind retry of a non-transient failure
//! (like `AlreadyPending`) would mask a caller bug.

use std::future::Future;

use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use talentry_subscriptions::{SubscriptionError, SubscriptionResult};

pub async fn retry_transient<T, F, Fut>(op: F) -> SubscriptionResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SubscriptionResult<T>>,
{
    let strategy = ExponentialBackoff::from_millis(50).map(jitter).take(3);
    RetryIf::spawn(strategy, op, SubscriptionError::is_transient).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_until_success() {
        let attempts = AtomicU32::new(0);
        let result = retry_transient(|| async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SubscriptionError::Transient("flaky".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_domain_errors() {
        let attempts = AtomicU32::new(0);
        let result: SubscriptionResult<()> = retry_transient(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(SubscriptionError::NoOpChange)
        })
        .await;
        assert!(matches!(result, Err(SubscriptionError::NoOpChange)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
