//! Runtime configuration.
//!
//! All settings have working defaults; a JSON file only needs the keys it
//! wants to override:
//!
//! ```json
//! { "retry": { "max_tries": 5 }, "rate_limit": { "threshold": 50 } }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How to run git.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    /// Path or name of the git binary.
    pub program: PathBuf,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

/// Retry bounds for network-shaped operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    pub max_tries: u32,
    /// Pause between attempts.
    pub sleep_interval_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_tries: 3,
            sleep_interval_secs: 10,
        }
    }
}

/// Call budget for the hosting API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Calls allowed per window before holding off.
    pub threshold: u32,
    /// Window length.
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            threshold: 60,
            window_secs: 60,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub git: GitSettings,
    pub retry: RetrySettings,
    pub rate_limit: RateLimitSettings,
}

impl MirrorConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Reject settings that would make the primitives misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.retry.max_tries == 0 {
            return Err(ConfigError::Invalid("retry.max_tries must be at least 1".into()));
        }
        if self.rate_limit.threshold == 0 {
            return Err(ConfigError::Invalid("rate_limit.threshold must be at least 1".into()));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Invalid("rate_limit.window_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Set the git binary.
    pub fn git_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.git.program = program.into();
        self
    }

    /// Set retry bounds.
    pub fn retry(mut self, max_tries: u32, sleep_interval_secs: u64) -> Self {
        self.retry = RetrySettings {
            max_tries,
            sleep_interval_secs,
        };
        self
    }

    /// Set the rate-limit window.
    pub fn rate_limit(mut self, threshold: u32, window_secs: u64) -> Self {
        self.rate_limit = RateLimitSettings {
            threshold,
            window_secs,
        };
        self
    }
}
