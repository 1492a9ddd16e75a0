//! Values exchanged with a repository host.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A repository as the host describes it.
///
/// Only the name is interpreted; everything else the host sends is kept
/// verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RepoInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Map::new(),
        }
    }

    /// an untyped field from the host's response
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Settings for a repository being created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub public: bool,
}

impl Default for RepoMetadata {
    fn default() -> Self {
        Self {
            description: None,
            homepage: None,
            public: true,
        }
    }
}

impl RepoMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn homepage(mut self, homepage: impl Into<String>) -> Self {
        self.homepage = Some(homepage.into());
        self
    }

    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }
}

/// The issue tracker and wiki switches of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggles {
    pub has_issues: bool,
    pub has_wiki: bool,
}

impl FeatureToggles {
    /// both off; mirrors take no issues and have no wiki
    pub const DISABLED: Self = Self {
        has_issues: false,
        has_wiki: false,
    };
}

/// Confirmation token from the first phase of a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeleteToken(pub String);

impl DeleteToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Answer to the second phase of a delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeleteResponse {
    pub const DELETED: &'static str = "deleted";

    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            extra: Map::new(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.status == Self::DELETED
    }
}
