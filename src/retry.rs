//! Backoff for idempotent requests.
//!
//! Only reads go through here. Writes (submits, apply-suggestion, profile
//! updates) are sent exactly once.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How often and how patiently a read is repeated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total tries, the first one included
    pub max_attempts: u32,
    /// Wait before the second try; doubled for each one after
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: initial_delay,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay.max(self.initial_delay);
        self
    }

    /// Language list, user profile, suggestions: 500ms, 1s
    pub fn idempotent_get() -> Self {
        Self::new(3, Duration::from_millis(500)).with_max_delay(Duration::from_secs(4))
    }

    /// One status check inside the job poll loop: 1s, 2s, 4s, 8s
    pub fn status_poll() -> Self {
        Self::new(5, Duration::from_secs(1)).with_max_delay(Duration::from_secs(8))
    }

    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Wait before try number `retry` (1 for the first repeat)
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::idempotent_get()
    }
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or the attempts run out. The last error is returned as is.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut retry = 0;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if retry > 0 {
                    debug!("{} recovered after {} retries", label, retry);
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        retry += 1;
        if retry >= config.max_attempts || !should_retry(&err) {
            if retry > 1 {
                warn!("{} gave up after {} attempts: {}", label, retry, err);
            }
            return Err(err);
        }

        let wait = config.backoff(retry);
        warn!(
            "{} failed ({}); retry {}/{} in {:?}",
            label,
            err,
            retry,
            config.max_attempts - 1,
            wait
        );
        sleep(wait).await;
    }
}
