//! Resilient access to a repository hosting API.
//!
//! The host itself is a [`RepoHost`] supplied by the caller (transport and
//! credentials are theirs). [`RemoteClient`] puts a [`RateLimiter`] in front
//! of every call and can retry calls under a [`RetryPolicy`](crate::retry::RetryPolicy).
//!
//! ```ignore
//! let client = RemoteClient::from_config(host, &config)?
//!     .with_retry(RetryPolicy::from_settings(&config.retry))
//!     .with_logger(|line| println!("{line}"));
//!
//! match client.get_info("vim-rails") {
//!     Err(e) if e.is_not_found() => { client.create("vim-rails", &RepoMetadata::new())?; }
//!     other => { other?; }
//! }
//! ```

mod client;
mod error;
mod host;
mod rate_limit;
mod types;

pub use client::{LogSink, RemoteClient};
pub use error::{RemoteError, RemoteResult};
pub use host::RepoHost;
pub use rate_limit::RateLimiter;
pub use types::{DeleteResponse, DeleteToken, FeatureToggles, RepoInfo, RepoMetadata};
