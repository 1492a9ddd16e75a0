//! Call-count rate limiting.
//!
//! Counts calls against a fixed window. Once the count passes the
//! threshold, the caller is held off until the window would have drained,
//! and only then does the window start over. Bursts under the threshold are
//! never delayed and never reset the window early.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::RateLimitSettings;

/// Shared per-client limiter state, mutated on every call.
pub struct RateLimiter {
    call_count: u32,
    window_start: Instant,
    threshold: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("call_count", &self.call_count)
            .field("threshold", &self.threshold)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_settings(&RateLimitSettings::default())
    }
}

impl RateLimiter {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self::with_clock(threshold, window, Arc::new(SystemClock))
    }

    pub fn with_clock(threshold: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            call_count: 0,
            window_start: clock.now(),
            threshold,
            window,
            clock,
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(settings.threshold, Duration::from_secs(settings.window_secs))
    }

    /// calls counted since the window last started
    pub fn calls(&self) -> u32 {
        self.call_count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Account for one call, blocking first if the threshold is exceeded.
    ///
    /// Returns how long the caller was held off, zero when it wasn't.
    pub fn check_and_wait(&mut self) -> Duration {
        self.check_and_wait_with(|_| {})
    }

    /// Like [`check_and_wait`](Self::check_and_wait), calling `before_sleep`
    /// with the holdoff just before blocking.
    pub fn check_and_wait_with<F>(&mut self, before_sleep: F) -> Duration
    where
        F: FnOnce(Duration),
    {
        self.call_count += 1;
        if self.call_count <= self.threshold {
            return Duration::ZERO;
        }

        let elapsed = self.clock.now().saturating_duration_since(self.window_start);
        let holdoff = self.window.saturating_sub(elapsed);
        if holdoff > Duration::ZERO {
            warn!(
                calls = self.call_count,
                threshold = self.threshold,
                holdoff_secs = holdoff.as_secs_f64(),
                "rate limit reached, holding off"
            );
            before_sleep(holdoff);
            self.clock.sleep(holdoff);
        } else {
            debug!(calls = self.call_count, "rate limit window already drained");
        }

        self.call_count = 0;
        self.window_start = self.clock.now();
        holdoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::ManualClock;

    fn limiter(threshold: u32) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::with_clock(threshold, Duration::from_secs(60), clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_trips_once_on_the_61st_call() {
        let (mut limiter, clock) = limiter(60);
        let mut tripped_at = Vec::new();
        for call in 1..=65 {
            if limiter.check_and_wait() > Duration::ZERO {
                tripped_at.push(call);
            }
        }
        assert_eq!(tripped_at, vec![61]);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
        // the window restarted after the trip
        assert_eq!(limiter.calls(), 4);
    }

    #[test]
    fn test_holdoff_is_remaining_window() {
        let (mut limiter, clock) = limiter(2);
        limiter.check_and_wait();
        clock.advance(Duration::from_secs(45));
        limiter.check_and_wait();
        assert_eq!(limiter.check_and_wait(), Duration::from_secs(15));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(15)]);
    }

    #[test]
    fn test_drained_window_resets_without_sleep() {
        let (mut limiter, clock) = limiter(2);
        limiter.check_and_wait();
        limiter.check_and_wait();
        clock.advance(Duration::from_secs(90));
        assert_eq!(limiter.check_and_wait(), Duration::ZERO);
        assert!(clock.sleeps().is_empty());
        assert_eq!(limiter.calls(), 0);
    }

    #[test]
    fn test_under_threshold_never_resets() {
        let (mut limiter, clock) = limiter(10);
        for _ in 0..10 {
            clock.advance(Duration::from_secs(30));
            limiter.check_and_wait();
        }
        // five minutes went by but the window only restarts on a trip
        assert_eq!(limiter.calls(), 10);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_notified_before_sleeping() {
        let (mut limiter, clock) = limiter(1);
        limiter.check_and_wait();
        let mut seen = None;
        limiter.check_and_wait_with(|holdoff| seen = Some((holdoff, clock.sleeps().len())));
        assert_eq!(seen, Some((Duration::from_secs(60), 0)));

        let mut called = false;
        limiter.check_and_wait_with(|_| called = true);
        assert!(!called);
    }

    #[test]
    fn test_from_settings() {
        let limiter = RateLimiter::from_settings(&RateLimitSettings {
            threshold: 5,
            window_secs: 1,
        });
        assert_eq!(limiter.threshold(), 5);
        assert_eq!(limiter.calls(), 0);
    }
}
