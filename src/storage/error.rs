//! Storage layer error types
//!
//! Every failure the git engine can produce lives here. We use `thiserror`
//! so each variant carries enough context (command text, captured output,
//! offending path) to diagnose a failure without re-running it.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::EntryKind;

/// the main error type for repository and commit operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// the on-disk layout is not a git repository of the requested kind
    #[error("invalid repository structure at {path}: {reason}")]
    Structure { path: PathBuf, reason: String },

    /// a git subprocess exited with a non-zero status
    #[error("{command} failed: {output}")]
    Git { command: String, output: String },

    /// the git binary could not be spawned at all
    #[error("could not run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// a blob was added without any contents
    #[error("no data supplied for {path}")]
    NoData { path: String },

    /// path resolution hit a segment that doesn't exist
    #[error("{path}: no entry named '{segment}'")]
    Path { path: String, segment: String },

    /// the resolved node is not of the requested kind
    #[error("{path}: type was {found} not {expected}")]
    TypeMismatch {
        path: String,
        expected: EntryKind,
        found: EntryKind,
    },

    /// the path is empty or otherwise unusable as a tree path
    #[error("invalid tree path: '{0}'")]
    InvalidPath(String),

    /// error from libgit2 while reading or writing objects
    #[error("libgit2 error: {0}")]
    Libgit2(#[from] git2::Error),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// build a structure error for a missing marker directory
    pub(crate) fn missing(path: impl Into<PathBuf>, marker: &std::path::Path) -> Self {
        StorageError::Structure {
            path: path.into(),
            reason: format!("{} does not exist", marker.display()),
        }
    }

    /// check if this error is about the repository layout
    pub fn is_structural(&self) -> bool {
        matches!(self, StorageError::Structure { .. })
    }

    /// check if this error came from tree manipulation inside a transaction
    pub fn is_tree_error(&self) -> bool {
        matches!(
            self,
            StorageError::NoData { .. }
                | StorageError::Path { .. }
                | StorageError::TypeMismatch { .. }
                | StorageError::InvalidPath(_)
        )
    }

    /// check if this error could plausibly go away on retry
    ///
    /// git doesn't tell us whether a failed pull was the network or a merge
    /// conflict, so every subprocess failure counts.
    pub fn is_retriable(&self) -> bool {
        matches!(self, StorageError::Git { .. } | StorageError::Spawn { .. })
    }

    /// captured git output, if this is a subprocess failure
    pub fn git_output(&self) -> Option<&str> {
        match self {
            StorageError::Git { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
