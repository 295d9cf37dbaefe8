//! Bounded exponential backoff and timeouts for calls to external services.

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry budget for transient failures (rate limits, dropped connections).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// Factor applied to the delay after each failed attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after `attempt` (1-based) has failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.initial_backoff_ms as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_backoff_ms as f64) as u64)
    }

    /// Longest a retried call can take when each attempt is bounded by
    /// `per_attempt`: every attempt plus every backoff sleep between them.
    pub fn worst_case(&self, per_attempt: Duration) -> Duration {
        let attempts = self.max_attempts.max(1);
        (1..attempts).fold(per_attempt * attempts, |total, attempt| {
            total + self.backoff(attempt)
        })
    }
}

/// Run `op` until it succeeds, fails permanently, or the budget runs out.
///
/// Only errors for which [`RagError::is_transient`] holds are retried. When
/// the last allowed attempt still fails transiently the error is wrapped in
/// [`RagError::RetriesExhausted`].
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) if err.is_transient() && max_attempts > 1 => {
                return Err(RagError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
            Err(err) => return Err(err),
        }
    }
}

/// Bound `fut` by `limit`, mapping expiry to [`RagError::Timeout`].
pub async fn with_timeout<T, Fut>(limit: Duration, operation: &str, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RagError::timeout(operation, limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(10), Duration::from_millis(8000));
    }

    #[test]
    fn test_worst_case_includes_backoff() {
        let policy = RetryPolicy::default();
        // 4 x 10s attempts + 0.5s + 1s + 2s of backoff.
        assert_eq!(
            policy.worst_case(Duration::from_secs(10)),
            Duration::from_millis(43_500)
        );
        assert_eq!(
            RetryPolicy::none().worst_case(Duration::from_secs(10)),
            Duration::from_secs(10)
        );
    }

    #[tokio::test]
    async fn test_outer_bound_lets_retries_exhaust() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 60,
            max_backoff_ms: 60,
            multiplier: 1.0,
        };
        let per_attempt = Duration::from_millis(20);

        let result: Result<()> = with_timeout(
            policy.worst_case(per_attempt),
            "retried call",
            retry_with_backoff(&policy, "busy service", || {
                with_timeout(per_attempt, "attempt", async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Err(RagError::RateLimited("429".into()))
                })
            }),
        )
        .await;

        assert!(matches!(result, Err(RagError::RetriesExhausted { .. })));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = retry_with_backoff(&fast_policy(3), "flaky", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(RagError::RateLimited("429".into()))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_fatal() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = retry_with_backoff(&fast_policy(3), "always busy", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(RagError::RateLimited("429".into()))
        })
        .await;

        match result {
            Err(RagError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = retry_with_backoff(&fast_policy(5), "bad request", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(RagError::LlmApi("400 Bad Request".into()))
        })
        .await;

        assert!(matches!(result, Err(RagError::LlmApi(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<()> = with_timeout(Duration::from_millis(5), "sleeping", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(RagError::Timeout { .. })));
    }
}
