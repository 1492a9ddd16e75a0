//! Commit transactions and commit metadata.
//!
//! A [`CommitTransaction`] is opened against a [`Repository`], seeded with a
//! copy of the HEAD tree, mutated through path-based calls, and finalized
//! into exactly one new commit on the current branch. Finalizing consumes the
//! transaction, so nothing can touch it afterwards.
//!
//! ```ignore
//! let mut tx = repo.transaction()?;
//! tx.empty_index();
//! tx.add("README", "This is a test readme file\n")?;
//! tx.add("plugin/foo.vim", script_bytes)?;
//! let commit = tx.finalize("Version 1.2", &author, None)?;
//! ```

use chrono::{DateTime, FixedOffset, Local, TimeZone};
use tracing::{debug, info};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::repository::Repository;
use crate::storage::tree::TreeNode;
use crate::storage::types::{CommitId, Entry, EntryKind, Identity, TreeId};

/// information about a commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub tree_id: TreeId,
    pub parent_ids: Vec<CommitId>,
    pub message: String,
    pub author: Identity,
    pub committer: Identity,
}

impl CommitInfo {
    /// create CommitInfo from a git2::Commit
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        Self {
            id: CommitId::new(commit.id()),
            tree_id: TreeId::new(commit.tree_id()),
            parent_ids: commit.parent_ids().map(CommitId::new).collect(),
            message: commit.message().unwrap_or("").to_string(),
            author: identity_from_signature(&commit.author()),
            committer: identity_from_signature(&commit.committer()),
        }
    }

    /// get the first (or only) parent
    pub fn first_parent(&self) -> Option<CommitId> {
        self.parent_ids.first().copied()
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

fn identity_from_signature(sig: &git2::Signature<'_>) -> Identity {
    let when = sig.when();
    let timestamp: Option<DateTime<FixedOffset>> = FixedOffset::east_opt(when.offset_minutes() * 60)
        .and_then(|offset| offset.timestamp_opt(when.seconds(), 0).single());
    Identity {
        name: sig.name().unwrap_or("Unknown").to_string(),
        email: sig.email().unwrap_or("unknown@unknown").to_string(),
        timestamp,
    }
}

/// A pending commit: a mutable snapshot of the tree plus the parent it
/// will be written on top of.
pub struct CommitTransaction<'repo> {
    repo: &'repo Repository,
    git: git2::Repository,
    root: TreeNode,
    parent: Option<CommitId>,
}

impl<'repo> CommitTransaction<'repo> {
    /// snapshot HEAD (or an empty tree for a repository with no commits)
    pub(crate) fn open(repo: &'repo Repository) -> StorageResult<Self> {
        let git = repo.open_objects()?;
        let parent = Repository::head_of(&git)?;

        let root = match parent {
            Some(id) => {
                let tree = git.find_commit(id.raw())?.tree()?;
                TreeNode::load(&git, &tree)?
            }
            None => TreeNode::default(),
        };
        debug!(root = %repo.root().display(), parent = ?parent.map(|p| p.short()), "opened commit transaction");

        Ok(Self {
            repo,
            git,
            root,
            parent,
        })
    }

    /// the commit this transaction will build on, if any
    pub fn parent(&self) -> Option<CommitId> {
        self.parent
    }

    /// store `contents` at `path`, creating directories as needed
    pub fn add(&mut self, path: &str, contents: impl AsRef<[u8]>) -> StorageResult<()> {
        self.add_optional(path, Some(contents.as_ref()))
    }

    /// like [`add`](Self::add), for callers whose payload may be missing
    ///
    /// `None` is a usage error ([`StorageError::NoData`]), distinct from an
    /// empty file.
    pub fn add_optional(&mut self, path: &str, contents: Option<&[u8]>) -> StorageResult<()> {
        let contents = contents.ok_or_else(|| StorageError::NoData {
            path: path.to_string(),
        })?;
        self.root.insert(path, contents.to_vec())
    }

    /// remove a top-level file and return what it contained
    pub fn remove(&mut self, name: &str) -> StorageResult<Vec<u8>> {
        let children = self
            .root
            .children_mut()
            .ok_or_else(|| StorageError::InvalidPath(name.to_string()))?;

        match children.get(name).map(TreeNode::kind) {
            None => Err(StorageError::Path {
                path: name.to_string(),
                segment: name.to_string(),
            }),
            Some(EntryKind::Blob) => match children.remove(name) {
                Some(TreeNode::Blob { data, .. }) => Ok(data),
                _ => Err(StorageError::InvalidPath(name.to_string())),
            },
            Some(found) => Err(StorageError::TypeMismatch {
                path: name.to_string(),
                expected: EntryKind::Blob,
                found,
            }),
        }
    }

    /// names at the top level, sorted
    pub fn entries(&self) -> Vec<String> {
        self.root.names()
    }

    /// resolve `path` and check its kind
    pub fn entry(&self, path: &str, expected: EntryKind) -> StorageResult<Entry> {
        self.root.entry(path, expected)
    }

    /// shorthand for a blob lookup
    pub fn blob(&self, path: &str) -> StorageResult<Vec<u8>> {
        match self.entry(path, EntryKind::Blob)? {
            Entry::Blob(data) => Ok(data),
            other => Err(StorageError::TypeMismatch {
                path: path.to_string(),
                expected: EntryKind::Blob,
                found: other.kind(),
            }),
        }
    }

    /// drop everything so the commit starts from a clean slate
    pub fn empty_index(&mut self) {
        self.root = TreeNode::default();
    }

    /// Write the snapshot and commit it on the current branch.
    ///
    /// `committer` defaults to `author`; identities without a timestamp share
    /// one "now". Returns `Ok(None)` without touching
    /// HEAD when the tree is identical to the parent's; a first commit is
    /// always written.
    pub fn finalize(
        self,
        message: &str,
        author: &Identity,
        committer: Option<&Identity>,
    ) -> StorageResult<Option<CommitId>> {
        let committer = committer.unwrap_or(author);
        let tree_id = self.root.write(&self.git)?;

        let parent_commit = match self.parent {
            Some(id) => Some(self.git.find_commit(id.raw())?),
            None => None,
        };

        if let Some(parent) = &parent_commit {
            if parent.tree_id() == tree_id {
                info!(
                    root = %self.repo.root().display(),
                    parent = %CommitId::new(parent.id()).short(),
                    "tree unchanged, no commit written"
                );
                return Ok(None);
            }
        }

        let tree = self.git.find_tree(tree_id)?;
        let now = Local::now().fixed_offset();
        let author_sig = author.or_at(now).to_git2_signature()?;
        let committer_sig = committer.or_at(now).to_git2_signature()?;
        let parents: Vec<&git2::Commit<'_>> = parent_commit.iter().collect();

        let oid = self.git.commit(
            Some("HEAD"),
            &author_sig,
            &committer_sig,
            message,
            &tree,
            &parents,
        )?;
        let id = CommitId::new(oid);

        info!(root = %self.repo.root().display(), commit = %id.short(), "committed");
        Ok(Some(id))
    }
}
