//! Sliding-window request limiter

use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Allows at most `limit` calls per rolling minute.
///
/// [`RateLimiter::acquire`] suspends the caller until the oldest call in the
/// window ages out; the lock is never held across the sleep.
#[derive(Debug)]
pub struct RateLimiter {
    limit: Option<NonZeroU32>,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// `None` disables limiting
    #[must_use]
    pub const fn per_minute(limit: Option<NonZeroU32>) -> Self {
        Self {
            limit,
            window: WINDOW,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub const fn limit(&self) -> Option<NonZeroU32> {
        self.limit
    }

    pub async fn acquire(&self) {
        let Some(limit) = self.limit else {
            return;
        };

        loop {
            let wait = {
                let mut calls = self.calls.lock();
                let now = Instant::now();
                while calls
                    .front()
                    .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
                {
                    calls.pop_front();
                }

                if calls.len() < limit.get() as usize {
                    calls.push_back(now);
                    return;
                }

                calls
                    .front()
                    .map_or(Duration::ZERO, |oldest| {
                        self.window
                            .saturating_sub(now.saturating_duration_since(*oldest))
                    })
            };

            tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Calls recorded in the current window
    pub fn in_flight(&self) -> usize {
        let now = Instant::now();
        self.calls
            .lock()
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < self.window)
            .count()
    }
}
