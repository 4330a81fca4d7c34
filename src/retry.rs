//! Retry helper
//!
//! Every API call goes through `with_retry`: three attempts with an
//! exponentially growing pause between them. All errors are retried alike;
//! the last one is returned.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempts per call
pub const MAX_ATTEMPTS: u32 = 3;

/// Pause before the second attempt; doubles for each attempt after that
pub const RETRY_BASE_DELAY_MS: u64 = 500;

/// Run `op` up to `MAX_ATTEMPTS` times, sleeping `base_delay`, then twice
/// that, between attempts
pub async fn with_retry<T, E, F, Fut>(label: &str, base_delay: Duration, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}/{}", label, attempt, MAX_ATTEMPTS);
                }
                return Ok(value);
            }
            Err(e) if attempt >= MAX_ATTEMPTS => {
                tracing::error!("{} failed after {} attempts: {}", label, MAX_ATTEMPTS, e);
                return Err(e);
            }
            Err(e) => {
                // 1x, 2x, 4x ...
                let delay = base_delay * (1u32 << (attempt - 1));
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    label,
                    attempt,
                    MAX_ATTEMPTS,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry("op", Duration::ZERO, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, String> = with_retry("op", Duration::ZERO, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("boom {}", n))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_with_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry("op", Duration::ZERO, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err(format!("boom {}", n))
        })
        .await;

        assert_eq!(result, Err("boom 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles() {
        let started = tokio::time::Instant::now();
        let result: Result<(), String> =
            with_retry("op", Duration::from_millis(100), || async { Err("nope".to_string()) }).await;

        assert!(result.is_err());
        // 100ms + 200ms between the three attempts
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }
}
