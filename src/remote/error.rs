//! Remote layer error types

use thiserror::Error;

/// errors from talking to a repository host
#[derive(Error, Debug)]
pub enum RemoteError {
    /// the host has no repository by that name
    #[error("repository not found: {0}")]
    NotFound(String),

    /// the host answered, but not in a shape we understand; `message`
    /// reads as a prefix to the repository name
    #[error("{message} {name}: {raw}")]
    Protocol {
        name: String,
        message: String,
        /// the response as received, serialized for diagnosis
        raw: String,
    },

    #[error("host api error{}: {message}", status_suffix(.status))]
    Api { status: Option<u16>, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RemoteError {
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Only transport-level api failures are worth another attempt; a
    /// missing repository or a malformed answer will not change.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Api { .. })
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

pub type RemoteResult<T> = Result<T, RemoteError>;
