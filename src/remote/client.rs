//! Rate-limited, retried access to a [`RepoHost`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::{ConfigResult, MirrorConfig};
use crate::remote::error::{RemoteError, RemoteResult};
use crate::remote::host::RepoHost;
use crate::remote::rate_limit::RateLimiter;
use crate::remote::types::{FeatureToggles, RepoInfo, RepoMetadata};
use crate::retry::RetryPolicy;

/// Caller-supplied sink for progress lines.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Wraps a host so that every call is rate limited and, optionally, retried.
pub struct RemoteClient<H> {
    host: Mutex<H>,
    limiter: Mutex<RateLimiter>,
    retry: RetryPolicy,
    logger: Option<LogSink>,
}

impl<H> fmt::Debug for RemoteClient<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient")
            .field("limiter", &*self.limiter.lock())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl<H: RepoHost> RemoteClient<H> {
    /// Default limiter, a single attempt per call, no log sink.
    pub fn new(host: H) -> Self {
        Self {
            host: Mutex::new(host),
            limiter: Mutex::new(RateLimiter::default()),
            retry: RetryPolicy::once(),
            logger: None,
        }
    }

    /// Limiter from a validated config.
    ///
    /// `config.retry` is not applied here; calls stay single-attempt until
    /// [`with_retry`](Self::with_retry) is given a policy, e.g.
    /// `RetryPolicy::from_settings(&config.retry)`.
    pub fn from_config(host: H, config: &MirrorConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::new(host).with_limiter(RateLimiter::from_settings(&config.rate_limit)))
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Mutex::new(limiter);
        self
    }

    /// Retry each host call under `retry`. Missing repositories and
    /// malformed answers are never retried.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Give the host back, e.g. to inspect a test double.
    pub fn into_host(self) -> H {
        self.host.into_inner()
    }

    fn log(&self, message: &str) {
        debug!(message, "remote progress");
        if let Some(logger) = &self.logger {
            logger(message);
        }
    }

    /// Rate-limit, then run one host operation; retried as a unit.
    fn call<T, F>(&self, task: &str, op: F) -> RemoteResult<T>
    where
        F: Fn(&mut H) -> RemoteResult<T>,
    {
        self.retry.retry_if(task, RemoteError::is_retriable, || {
            self.limiter.lock().check_and_wait_with(|holdoff| {
                self.log(&format!(
                    "hit rate limit, sleeping for {} seconds",
                    holdoff.as_secs()
                ));
            });
            debug!(task, "calling host");
            op(&mut *self.host.lock())
        })
    }

    // ==================== Operations ====================

    /// Look a repository up. A missing one is [`RemoteError::NotFound`].
    pub fn get_info(&self, name: &str) -> RemoteResult<RepoInfo> {
        self.call(&format!("getting {name}"), |host| host.get(name))
    }

    /// Turn off the issue tracker and wiki.
    pub fn disable_social_features(&self, name: &str) -> RemoteResult<()> {
        self.call(&format!("updating {name}"), |host| {
            host.update(name, &FeatureToggles::DISABLED)
        })
    }

    /// Create a repository, then disable its social features.
    ///
    /// If the create fails the update is never sent.
    pub fn create(&self, name: &str, metadata: &RepoMetadata) -> RemoteResult<RepoInfo> {
        let info = self.call(&format!("creating {name}"), |host| host.create(name, metadata))?;
        self.disable_social_features(name)?;
        info!(%name, "created remote repository");
        Ok(info)
    }

    /// Two-phase delete: request a token, then confirm with it.
    pub fn delete(&self, name: &str) -> RemoteResult<()> {
        let token = self
            .call(&format!("requesting delete of {name}"), |host| host.delete_request(name))?
            .ok_or_else(|| RemoteError::Protocol {
                name: name.to_string(),
                message: "got no token trying to delete".to_string(),
                raw: "null".to_string(),
            })?;

        let response = self.call(&format!("confirming delete of {name}"), |host| {
            host.delete_confirm(name, &token)
        })?;
        if !response.is_deleted() {
            return Err(RemoteError::Protocol {
                name: name.to_string(),
                message: "unknown response from second stage for".to_string(),
                raw: serde_json::to_string(&response)?,
            });
        }

        self.log(&format!("removed {name}"));
        info!(%name, "deleted remote repository");
        Ok(())
    }

    /// Every repository, page by page from 1 until the host returns an
    /// empty page. There is no other bound on the page count.
    pub fn list_all(&self) -> RemoteResult<Vec<RepoInfo>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            self.log(&format!("fetching page {page}"));
            let batch = self.call(&format!("listing page {page}"), |host| host.list(page))?;
            if batch.is_empty() {
                break;
            }
            all.extend(batch);
            page += 1;
        }
        debug!(count = all.len(), pages = page - 1, "listed remote repositories");
        Ok(all)
    }
}
