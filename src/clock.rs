//! Time source for the retry and rate-limit primitives.
//!
//! Both only ever need "what time is it" and "block for a while", so they
//! take a [`Clock`] instead of calling `std::thread::sleep` directly.

use std::time::{Duration, Instant};

/// A monotonic clock that can block the caller.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Block the current thread. Not cancellable.
    fn sleep(&self, duration: Duration);
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
