//! Retry policy with a pluggable observer and an optional error classifier.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::RetrySettings;

/// What the observer is told about each failed attempt.
pub struct RetryEvent<'a> {
    pub task: &'a str,
    /// 1-based attempt number that just failed.
    pub attempt: u32,
    pub max_tries: u32,
    pub error: &'a dyn fmt::Display,
    /// false when this failure is the one being returned to the caller
    pub will_retry: bool,
}

/// Called once per failed attempt.
pub type RetryObserver = Arc<dyn Fn(&RetryEvent<'_>) + Send + Sync>;

/// Fixed-interval, fixed-count retry.
#[derive(Clone)]
pub struct RetryPolicy {
    max_tries: u32,
    sleep_interval: Duration,
    observer: RetryObserver,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_tries", &self.max_tries)
            .field("sleep_interval", &self.sleep_interval)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    /// `max_tries` counts the first attempt; zero is treated as one.
    pub fn new(max_tries: u32, sleep_interval: Duration) -> Self {
        Self {
            max_tries: max_tries.max(1),
            sleep_interval,
            observer: Arc::new(|_| {}),
            clock: Arc::new(SystemClock),
        }
    }

    /// a single attempt, no retries
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_tries,
            Duration::from_secs(settings.sleep_interval_secs),
        )
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&RetryEvent<'_>) + Send + Sync + 'static,
    {
        self.observer = Arc::new(observer);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    pub fn sleep_interval(&self) -> Duration {
        self.sleep_interval
    }

    /// Run `body` until it succeeds or the attempts run out.
    ///
    /// Every error counts as retryable.
    pub fn retry<T, E, F>(&self, task: &str, body: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: fmt::Display,
    {
        self.retry_if(task, |_| true, body)
    }

    /// Like [`retry`](Self::retry), but stops at the first error that
    /// `is_retryable` rejects.
    pub fn retry_if<T, E, F, C>(&self, task: &str, is_retryable: C, mut body: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        C: Fn(&E) -> bool,
        E: fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match body() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(task, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let will_retry = attempt < self.max_tries && is_retryable(&error);
                    (self.observer)(&RetryEvent {
                        task,
                        attempt,
                        max_tries: self.max_tries,
                        error: &error,
                        will_retry,
                    });

                    if !will_retry {
                        warn!(task, attempt, max_tries = self.max_tries, %error, "giving up");
                        return Err(error);
                    }

                    warn!(
                        task,
                        attempt,
                        max_tries = self.max_tries,
                        %error,
                        retry_in_secs = self.sleep_interval.as_secs_f64(),
                        "attempt failed, retrying"
                    );
                    self.clock.sleep(self.sleep_interval);
                    attempt += 1;
                }
            }
        }
    }
}
