//! Fixed-budget retries with exponential backoff

use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::Result;

/// Retry budget: `attempts` tries, sleeping `base_delay * 2^n` after the
/// n-th failure (counting from zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: NonZeroU32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: NonZeroU32::new(3).unwrap_or(NonZeroU32::MIN),
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Zero attempts is treated as one
    #[must_use]
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN),
            base_delay,
        }
    }

    /// A policy that never retries
    #[must_use]
    pub const fn single() -> Self {
        Self {
            attempts: NonZeroU32::MIN,
            base_delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts.get()
    }

    /// Delay after the `attempt`-th failure
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }

    /// Run `op` until it succeeds or the budget is spent.
    ///
    /// Only the last error is returned; earlier ones are logged.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.get();
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 >= attempts => return Err(e),
                Err(e) => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
