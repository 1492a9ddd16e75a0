//! Bounded retry for operations that are expected to fail transiently.
//!
//! Network-shaped calls (clone, pull, push, hosting API requests) are run
//! through a [`RetryPolicy`]: a fixed number of attempts with a fixed pause
//! in between. The final error is handed back untouched.
//!
//! ```ignore
//! let policy = RetryPolicy::new(3, Duration::from_secs(10))
//!     .with_observer(|event| eprintln!("{} failed (attempt {})", event.task, event.attempt));
//! policy.retry("pushing origin master", || repo.git(["push", "origin", "master"]))?;
//! ```

mod policy;

pub use policy::{RetryEvent, RetryObserver, RetryPolicy};
