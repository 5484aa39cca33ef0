//! Bounded retry with a linear backoff policy.
//!
//! No captured mutable state beyond the attempt counter: callers get the
//! attempt number as an argument and the policy decides the delay.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub(crate) struct BackoffPolicy {
    base: Duration,
}

impl BackoffPolicy {
    /// Linear backoff: `attempt × base` after the attempt-th failure.
    pub fn linear(base: Duration) -> Self {
        Self { base }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.base * attempt
    }
}

/// Run `op` up to `max_attempts` times, sleeping per the policy between
/// failures. The final failure is returned unchanged.
pub(crate) async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    policy: BackoffPolicy,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => return Err(err),
            Err(err) => {
                warn!(attempt, max_attempts, error = %err, "attempt failed, backing off");
                tokio::time::sleep(policy.delay(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_first_try_without_sleeping() {
        let started = tokio::time::Instant::now();
        let result: Result<u32, String> =
            retry_with_backoff(3, BackoffPolicy::linear(Duration::from_secs(1)), |_| async {
                Ok(7)
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_linear_backoff() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<u32, String> =
            retry_with_backoff(3, BackoffPolicy::linear(Duration::from_secs(1)), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("attempt {attempt} failed"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after attempt 1 + 2s after attempt 2
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> =
            retry_with_backoff(3, BackoffPolicy::linear(Duration::from_secs(1)), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("attempt {attempt}")) }
            })
            .await;

        assert_eq!(result.unwrap_err(), "attempt 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_max_attempts_still_runs_once() {
        let result: Result<u32, String> =
            retry_with_backoff(0, BackoffPolicy::linear(Duration::from_secs(1)), |_| async {
                Ok(1)
            })
            .await;
        assert_eq!(result.unwrap(), 1);
    }
}
