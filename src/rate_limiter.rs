//! Rolling-window rate limiter
//!
//! Shared by every component that issues external calls. One instance is
//! constructed per quota and passed explicitly to its users.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Allows at most `max_calls` acquisitions within any `period`.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// A `max_calls` of zero is treated as one.
    pub fn new(max_calls: usize, period: Duration) -> Self {
        let max_calls = max_calls.max(1);
        Self {
            max_calls,
            period,
            timestamps: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Negative or NaN periods become zero; periods too large for a
    /// `Duration` saturate.
    pub fn per_seconds(max_calls: usize, period_secs: f64) -> Self {
        let period = Duration::try_from_secs_f64(period_secs.max(0.0)).unwrap_or(Duration::MAX);
        Self::new(max_calls, period)
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait until the window has room, then record this call.
    ///
    /// The lock covers only prune-check-append. It is released while
    /// sleeping and the window is re-validated on wake, so concurrent
    /// callers never exceed the quota.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut stamps = self
                    .timestamps
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let now = Instant::now();

                while let Some(oldest) = stamps.front() {
                    if now.duration_since(*oldest) >= self.period {
                        stamps.pop_front();
                    } else {
                        break;
                    }
                }

                if stamps.len() < self.max_calls {
                    stamps.push_back(now);
                    debug!(in_window = stamps.len(), "Rate limiter: call admitted");
                    return;
                }

                // Window is full and non-empty: wait for the oldest call to age out.
                self.period - now.duration_since(stamps[0])
            };

            info!(
                wait_ms = wait.as_millis() as u64,
                max_calls = self.max_calls,
                "Rate limiter: sleeping to respect rate limit"
            );
            sleep(wait).await;
        }
    }

    /// Calls currently counted against the window.
    pub fn in_window(&self) -> usize {
        let stamps = self
            .timestamps
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        stamps
            .iter()
            .filter(|t| now.duration_since(**t) < self.period)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_fourth_call_waits_for_window() {
        let limiter = RateLimiter::per_seconds(3, 5.0);
        let start = Instant::now();
        let mut offsets = Vec::new();

        for _ in 0..6 {
            limiter.acquire().await;
            offsets.push(start.elapsed());
        }

        for offset in &offsets[..3] {
            assert_eq!(*offset, Duration::ZERO);
        }
        for offset in &offsets[3..] {
            assert_eq!(*offset, Duration::from_secs(5));
        }
    }

    #[test]
    fn test_out_of_range_periods_do_not_panic() {
        assert_eq!(RateLimiter::per_seconds(2, f64::INFINITY).period(), Duration::MAX);
        assert_eq!(RateLimiter::per_seconds(2, f64::NAN).period(), Duration::ZERO);
        assert_eq!(RateLimiter::per_seconds(2, -3.0).period(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_remainder_of_oldest_call() {
        let limiter = RateLimiter::per_seconds(3, 5.0);
        let start = Instant::now();

        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        limiter.acquire().await;
        limiter.acquire().await;

        let before_fourth = start.elapsed();
        limiter.acquire().await;
        let waited = start.elapsed() - before_fourth;

        assert_eq!(before_fourth, Duration::from_secs(2));
        assert_eq!(waited, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_calls_are_pruned() {
        let limiter = RateLimiter::per_seconds(2, 1.0);
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(limiter.in_window(), 2);

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(limiter.in_window(), 0);

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_limiter_across_tasks() {
        let limiter = Arc::new(RateLimiter::per_seconds(2, 1.0));
        let start = Instant::now();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut offsets = Vec::new();
        for handle in handles {
            offsets.push(handle.await.unwrap());
        }
        offsets.sort();

        // Two per second: 0, 0, 1, 1, 2.
        assert_eq!(
            offsets,
            vec![
                Duration::ZERO,
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_secs(2),
            ]
        );
    }

    #[test]
    fn test_zero_max_calls_is_clamped() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.max_calls(), 1);
    }
}
