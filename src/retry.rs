//! Bounded retry wrapper for fallible chain and backend calls
//!
//! Every attempt can be raced against a per-attempt timeout; failed attempts
//! back off exponentially up to a cap. Two standing profiles cover the two
//! kinds of chain traffic: `read` for observational calls, `write` for
//! state-changing calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{error, warn};

use crate::error::{LaminarError, Result};

/// Retry behavior for one named operation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1)
    pub max_attempts: u32,
    /// Per-attempt deadline; `None` lets an attempt run unbounded
    pub attempt_timeout: Option<Duration>,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound on the backoff delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            attempt_timeout: None,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    /// Profile for observational chain calls: 2 attempts, 5s per attempt
    pub fn read() -> Self {
        Self {
            max_attempts: 2,
            attempt_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        }
    }

    /// Profile for state-changing calls: 3 attempts, 10s per attempt
    pub fn write() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Some(Duration::from_secs(10)),
            ..Default::default()
        }
    }

    /// Delay after failed attempt `attempt` (1-based):
    /// `min(base_delay * 2^(attempt-1), max_delay)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Execute `op` under `policy`, returning the first success or the error
/// that exhausted the attempts.
pub async fn with_retry<T, F, Fut>(name: &str, policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        let result = match policy.attempt_timeout {
            Some(limit) => match timeout(limit, op()).await {
                Ok(inner) => inner,
                Err(_) => Err(LaminarError::Timeout {
                    name: name.to_string(),
                    elapsed_ms: limit.as_millis() as u64,
                }),
            },
            None => op().await,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    "Operation '{}' attempt {}/{} failed: {}",
                    name, attempt, max_attempts, e
                );
                last_error = e.to_string();
                if attempt < max_attempts {
                    sleep(policy.backoff_delay(attempt)).await;
                }
            }
        }
    }

    error!(
        "Operation '{}' exhausted {} attempts: {}",
        name, max_attempts, last_error
    );
    Err(LaminarError::RetriesExhausted {
        name: name.to_string(),
        attempts: max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 3,
            attempt_timeout: None,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        };
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff_delay(10), Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_failures_with_expected_delays() {
        let policy = RetryPolicy {
            max_attempts: 3,
            attempt_timeout: None,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        };
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let start = tokio::time::Instant::now();

        let value = with_retry("flaky", &policy, move || {
            let calls = calls_in_op.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(LaminarError::Internal("transient".to_string()))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await
        .expect("third attempt should succeed");

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1000ms before attempt 2, 2000ms before attempt 3
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(3100), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_timeout_counts_as_failure() {
        let policy = RetryPolicy {
            max_attempts: 1,
            attempt_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };

        let result: Result<()> = with_retry("hung-call", &policy, || async {
            sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        match result {
            Err(LaminarError::RetriesExhausted {
                attempts,
                last_error,
                ..
            }) => {
                assert_eq!(attempts, 1);
                assert!(last_error.contains("timed out"), "got: {}", last_error);
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_propagates_last_error() {
        let policy = RetryPolicy {
            max_attempts: 2,
            attempt_timeout: None,
            ..Default::default()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();

        let result: Result<()> = with_retry("always-fails", &policy, move || {
            let calls = calls_in_op.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(LaminarError::ChainCall(format!("boom {}", n)))
            }
        })
        .await;

        match result {
            Err(LaminarError::RetriesExhausted {
                attempts,
                last_error,
                ..
            }) => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("boom 1"));
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|_| ())),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn first_success_returns_immediately() {
        let policy = RetryPolicy::read();
        let value = with_retry("ok", &policy, || async { Ok(7u64) })
            .await
            .expect("should succeed");
        assert_eq!(value, 7);
    }
}
