//! core type-safe wrappers around git primitives for the storage layer.

use std::fmt;

use chrono::{DateTime, FixedOffset, Local};
use git2::Oid;
use serde::{Deserialize, Serialize};

/// This makes sure we don't accidentally pass a tree ID where a commit ID
/// is expected. The inner Oid is only accessible within the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitId(pub(crate) Oid);

impl CommitId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    /// raw Oid (for internal use only)
    pub(crate) fn raw(&self) -> Oid {
        self.0
    }

    /// parse CommitId from a hex string
    pub fn from_hex(hex: &str) -> Result<Self, git2::Error> {
        Oid::from_str(hex).map(CommitId)
    }

    /// short form of the commit ID
    pub fn short(&self) -> String {
        self.0.to_string()[..7].to_string()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Git tree identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(pub(crate) Oid);

impl TreeId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// author, committer or tagger identity
///
/// When `timestamp` is unset the identity is stamped with the current local
/// time at the moment it is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl Identity {
    /// create an identity stamped with "now" at use time
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timestamp: None,
        }
    }

    /// pin the identity to an exact time and offset
    pub fn at(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// a copy pinned to `now` unless a timestamp is already set
    pub fn or_at(&self, now: DateTime<FixedOffset>) -> Self {
        Self {
            timestamp: Some(self.timestamp.unwrap_or(now)),
            ..self.clone()
        }
    }

    /// the effective timestamp
    pub fn time(&self) -> DateTime<FixedOffset> {
        self.timestamp.unwrap_or_else(|| Local::now().fixed_offset())
    }

    /// render the time the way git expects in `GIT_COMMITTER_DATE`
    ///
    /// `%z` is always four digits, so `-07:00` comes out as `-0700`.
    pub fn git_date(&self) -> String {
        format_git_date(&self.time())
    }

    /// convert to git2::Signature, keeping the exact offset
    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        let time = self.time();
        let offset_minutes = time.offset().local_minus_utc() / 60;
        git2::Signature::new(
            &self.name,
            &self.email,
            &git2::Time::new(time.timestamp(), offset_minutes),
        )
    }
}

/// render `<seconds since epoch> <±HHMM>`
pub fn format_git_date(time: &DateTime<FixedOffset>) -> String {
    format!("{} {}", time.timestamp(), time.format("%z"))
}

/// the kinds of tree entry the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Blob,
    Tree,
    /// a gitlink: a commit in another repository
    Submodule,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Blob => write!(f, "blob"),
            EntryKind::Tree => write!(f, "tree"),
            EntryKind::Submodule => write!(f, "submodule"),
        }
    }
}

/// a resolved entry: blob bytes, the sorted names under a tree, or the
/// commit a submodule points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Blob(Vec<u8>),
    Tree(Vec<String>),
    Submodule(CommitId),
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Blob(_) => EntryKind::Blob,
            Entry::Tree(_) => EntryKind::Tree,
            Entry::Submodule(_) => EntryKind::Submodule,
        }
    }

    pub fn into_blob(self) -> Option<Vec<u8>> {
        match self {
            Entry::Blob(data) => Some(data),
            _ => None,
        }
    }

    pub fn into_names(self) -> Option<Vec<String>> {
        match self {
            Entry::Tree(names) => Some(names),
            _ => None,
        }
    }
}
