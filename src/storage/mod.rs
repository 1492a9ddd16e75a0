//! storage layer for scriptmirror
//!
//! this module wraps a git repository on disk. Commits are assembled in memory
//! as a tree of blobs and written in one step, while remotes, clones, pushes
//! and tags go through the `git` binary.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Repository                           │
//! │   (open/create/clone, remotes, pull/push, tags, commits)    │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                               │
//!                 ▼                               ▼
//!        ┌─────────────────┐             ┌─────────────────┐
//!        │CommitTransaction│             │    GitRunner    │
//!        │   (libgit2)     │             │  (git process)  │
//!        └─────────────────┘             └─────────────────┘
//!                 │
//!                 ▼
//!          ┌─────────────┐
//!          │  TreeNode   │
//!          │ (in memory) │
//!          └─────────────┘
//!  ```
//!
//! # Usage
//!
//! ```ignore
//! use scriptmirror::storage::{Identity, Repository, Tag};
//!
//! let repo = Repository::create("./mirror.git", true)?;
//! let author = Identity::new("Mirror Bot", "bot@example.com");
//!
//! let mut tx = repo.transaction()?;
//! tx.add("README", "hello\n")?;
//! tx.add("src/main.js", script_source)?;
//! tx.finalize("initial import", &author, None)?;
//!
//! repo.create_tag(&Tag::new("1.0", "version 1.0", author))?;
//! ```

mod commit;
mod error;
mod refs;
mod repository;
mod runner;
mod tree;
mod types;

// Re-export public API
pub use commit::{CommitInfo, CommitTransaction};
pub use error::{StorageError, StorageResult};
pub use refs::{is_valid_tag_name, Tag};
pub use repository::{Repository, DEFAULT_BRANCH};
pub use runner::{describe, GitRunner, SystemGit};
pub use tree::{RawEntry, TreeNode, REGULAR_FILE};
pub use types::{format_git_date, CommitId, Entry, EntryKind, Identity, TreeId};
