//! Node-level retry loop.

use std::future::Future;

use pipewright_types::{BackoffPolicy, Result};

/// Result of a retried operation plus the number of attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

/// Call `f` up to `max_attempts` times (at least once), stopping at the first
/// success. Every error is retried; `f` receives the 1-indexed attempt number.
///
/// Between attempts the loop sleeps for `policy.delay_for_attempt(attempt - 1)`.
pub async fn execute_with_retry<T, F, Fut>(
    f: F,
    max_attempts: u32,
    policy: &BackoffPolicy,
    node_id: &str,
) -> RetryOutcome<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f(attempt).await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_for_attempt(attempt as usize - 1);
                tracing::warn!(node = %node_id, attempt, delay_ms = %delay.as_millis(), error = %e, "Node attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return RetryOutcome {
                    result: Err(e),
                    attempts: attempt,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipewright_types::PipewrightError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn boom() -> PipewrightError {
        PipewrightError::Other("boom".into())
    }

    #[tokio::test]
    async fn success_on_first_try() {
        let outcome = execute_with_retry(|_| async { Ok("done") }, 3, &BackoffPolicy::None, "a").await;
        assert_eq!(outcome.result.unwrap(), "done");
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn retries_any_error_until_success() {
        let outcome = execute_with_retry(
            |attempt| async move {
                if attempt < 3 {
                    Err(boom())
                } else {
                    Ok(attempt)
                }
            },
            5,
            &BackoffPolicy::None,
            "b",
        )
        .await;
        assert_eq!(outcome.result.unwrap(), 3);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let outcome: RetryOutcome<()> = execute_with_retry(
            move |_| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(boom())
                }
            },
            3,
            &BackoffPolicy::None,
            "c",
        )
        .await;
        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let outcome: RetryOutcome<()> =
            execute_with_retry(|_| async { Err(boom()) }, 0, &BackoffPolicy::None, "d").await;
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_between_attempts() {
        let started = tokio::time::Instant::now();
        let policy = BackoffPolicy::Exponential {
            base: Duration::from_millis(200),
            max: Duration::from_secs(30),
        };
        let _: RetryOutcome<()> = execute_with_retry(|_| async { Err(boom()) }, 3, &policy, "e").await;
        // 200ms after the first failure, 400ms after the second.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(600) && elapsed < Duration::from_millis(700));
    }
}
