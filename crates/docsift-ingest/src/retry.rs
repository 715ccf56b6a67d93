//! Exponential backoff for rate-limited embedding and index calls.

use std::future::Future;
use std::time::Duration;

use docsift_core::{IngestConfig, Result};

/// Bounded exponential backoff for calls that may be rate limited.
///
/// Only [`DocsiftError::RateLimited`](docsift_core::DocsiftError::RateLimited)
/// is retried; every other error is returned on the spot.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use docsift_ingest::RetryPolicy;
///
/// let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(5));
/// assert_eq!(policy.delay_for(0), Duration::from_secs(1));
/// assert_eq!(policy.delay_for(2), Duration::from_secs(4));
/// assert_eq!(policy.delay_for(3), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

impl RetryPolicy {
    /// Policy retrying up to `max_retries` times, starting at `base_delay`
    /// and doubling up to `max_delay`.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Policy from the `[ingest]` section.
    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// Delay before retry number `attempt` (0-based): `base << attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `op`, retrying rate-limited failures up to `max_retries` times.
    ///
    /// # Errors
    ///
    /// Returns the last rate-limit error once retries are exhausted, or the
    /// first non-rate-limit error.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Err(e) if e.is_rate_limited() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{label} rate limited, retrying in {}ms ({}/{})",
                        delay.as_millis(),
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
