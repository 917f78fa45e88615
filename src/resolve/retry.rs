//! Bounded retry for rate-limited upstream calls.
//!
//! Only rate-limit failures are retried: up to 3 retries with exponential
//! backoff starting at 2 seconds and capped at 30 seconds. Any other error
//! fails immediately. Exhaustion surfaces a bounded error naming the total
//! attempt count, so a throttled batch can never hang indefinitely.

use std::sync::atomic::{AtomicU32, Ordering};

use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::warn;

use crate::constants::{MAX_RATE_LIMIT_RETRIES, RATE_LIMIT_BACKOFF_BASE_MS, RATE_LIMIT_BACKOFF_MAX};
use crate::core::{PinionError, Result};

/// Run `operation`, retrying while it fails with a rate-limit error.
///
/// `host` names the upstream authority for logging and for the final
/// [`PinionError::RateLimited`] if every attempt is throttled.
pub async fn with_rate_limit_retry<T, F, Fut>(host: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = AtomicU32::new(0);

    // Delays of 2s, 4s, 8s; the cap only matters if the retry budget grows.
    let strategy = ExponentialBackoff::from_millis(2)
        .factor(RATE_LIMIT_BACKOFF_BASE_MS / 2)
        .max_delay(RATE_LIMIT_BACKOFF_MAX)
        .take(MAX_RATE_LIMIT_RETRIES);

    let result = RetryIf::start(
        strategy,
        || {
            attempts.fetch_add(1, Ordering::SeqCst);
            operation()
        },
        |e: &PinionError| {
            let throttled = e.is_rate_limited();
            if throttled {
                warn!(host, error = %e, "rate limited, backing off");
            }
            throttled
        },
    )
    .await;

    match result {
        Err(e) if e.is_rate_limited() => Err(PinionError::RateLimited {
            host: host.to_string(),
            attempts: attempts.load(Ordering::SeqCst),
        }),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    fn throttle_error() -> PinionError {
        PinionError::ApiStatus {
            url: "https://api.github.com/repos/a/b/releases".to_string(),
            status: 403,
            body: "API rate limit exceeded".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn three_throttles_then_success_returns_the_value() {
        let failures = Mutex::new(3u32);
        let result = with_rate_limit_retry("api.github.com", || async {
            let mut remaining = failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                Err(throttle_error())
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn four_throttles_exhaust_the_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_rate_limit_retry("api.github.com", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(throttle_error())
        })
        .await;

        match result.unwrap_err() {
            PinionError::RateLimited { host, attempts } => {
                assert_eq!(host, "api.github.com");
                assert_eq!(attempts, 4, "initial call plus three retries");
            }
            other => panic!("expected RateLimited, got {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn non_rate_limit_errors_fail_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_rate_limit_retry("api.github.com", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PinionError::NotFound {
                object: "tag v9".to_string(),
                url: "https://api.github.com/repos/a/b/git/ref/tags/v9".to_string(),
            })
        })
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
