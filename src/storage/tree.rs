//! In-memory tree for commit transactions.
//!
//! A transaction loads the HEAD tree into owned [`TreeNode`]s, mutates them
//! freely, and only turns them into git objects when it is finalized. Nothing
//! here touches the object database except [`TreeNode::load`] and
//! [`TreeNode::write`].
//!
//! Loading and writing an untouched tree gives back the same tree id: blobs
//! keep their filemode, submodule links are kept as links, and entries whose
//! names aren't UTF-8 are carried along verbatim.

use std::collections::BTreeMap;

use git2::{FileMode, ObjectType, Oid, Repository, Tree};
use tracing::debug;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{CommitId, Entry, EntryKind};

/// filemode of a plain, non-executable file
pub const REGULAR_FILE: i32 = 0o100644;

/// a tree entry the engine doesn't address by name, written back as is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub name: Vec<u8>,
    pub id: Oid,
    pub mode: i32,
}

/// one node of the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    /// file contents with their git filemode (regular, executable, symlink)
    Blob { data: Vec<u8>, mode: i32 },
    Tree {
        children: BTreeMap<String, TreeNode>,
        raw: Vec<RawEntry>,
    },
    Submodule(CommitId),
}

impl Default for TreeNode {
    fn default() -> Self {
        TreeNode::Tree {
            children: BTreeMap::new(),
            raw: Vec::new(),
        }
    }
}

impl TreeNode {
    /// a regular file
    pub fn file(data: Vec<u8>) -> Self {
        TreeNode::Blob {
            data,
            mode: REGULAR_FILE,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            TreeNode::Blob { .. } => EntryKind::Blob,
            TreeNode::Tree { .. } => EntryKind::Tree,
            TreeNode::Submodule(_) => EntryKind::Submodule,
        }
    }

    /// the filemode this node is written with
    pub fn mode(&self) -> i32 {
        match self {
            TreeNode::Blob { mode, .. } => *mode,
            TreeNode::Tree { .. } => FileMode::Tree.into(),
            TreeNode::Submodule(_) => FileMode::Commit.into(),
        }
    }

    fn is_empty_tree(&self) -> bool {
        matches!(self, TreeNode::Tree { children, raw } if children.is_empty() && raw.is_empty())
    }

    /// read a git tree (recursively) into owned nodes
    pub fn load(repo: &Repository, tree: &Tree<'_>) -> StorageResult<Self> {
        let mut children = BTreeMap::new();
        let mut raw = Vec::new();
        for entry in tree.iter() {
            let mode = entry.filemode();
            let node = match (entry.name(), entry.kind()) {
                (Some(_), Some(ObjectType::Blob)) => TreeNode::Blob {
                    data: repo.find_blob(entry.id())?.content().to_vec(),
                    mode,
                },
                (Some(_), Some(ObjectType::Tree)) => TreeNode::load(repo, &repo.find_tree(entry.id())?)?,
                (Some(_), Some(ObjectType::Commit)) => TreeNode::Submodule(CommitId::new(entry.id())),
                (name, kind) => {
                    debug!(?name, ?kind, id = %entry.id(), "keeping tree entry verbatim");
                    raw.push(RawEntry {
                        name: entry.name_bytes().to_vec(),
                        id: entry.id(),
                        mode,
                    });
                    continue;
                }
            };
            if let Some(name) = entry.name() {
                children.insert(name.to_string(), node);
            }
        }
        Ok(TreeNode::Tree { children, raw })
    }

    /// write this node and everything under it, returning the object id
    ///
    /// Empty directories are dropped since git can't represent them in a
    /// working tree.
    pub fn write(&self, repo: &Repository) -> StorageResult<Oid> {
        match self {
            TreeNode::Blob { data, .. } => Ok(repo.blob(data)?),
            TreeNode::Submodule(id) => Ok(id.raw()),
            TreeNode::Tree { children, raw } => {
                let mut builder = repo.treebuilder(None)?;
                for (name, child) in children {
                    if child.is_empty_tree() {
                        continue;
                    }
                    builder.insert(name.as_str(), child.write(repo)?, child.mode())?;
                }
                for entry in raw {
                    builder.insert(entry.name.clone(), entry.id, entry.mode)?;
                }
                Ok(builder.write()?)
            }
        }
    }

    fn children(&self) -> Option<&BTreeMap<String, TreeNode>> {
        match self {
            TreeNode::Tree { children, .. } => Some(children),
            _ => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut BTreeMap<String, TreeNode>> {
        match self {
            TreeNode::Tree { children, .. } => Some(children),
            _ => None,
        }
    }

    /// names directly under this node, sorted
    pub fn names(&self) -> Vec<String> {
        self.children()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// follow a `/`-separated path down from this node
    pub fn resolve(&self, path: &str) -> StorageResult<&TreeNode> {
        let mut node = self;
        for segment in split_path(path)? {
            let children = node.children().ok_or_else(|| StorageError::TypeMismatch {
                path: path.to_string(),
                expected: EntryKind::Tree,
                found: node.kind(),
            })?;
            node = children.get(segment).ok_or_else(|| StorageError::Path {
                path: path.to_string(),
                segment: segment.to_string(),
            })?;
        }
        Ok(node)
    }

    /// resolve a path and check it is the expected kind
    pub fn entry(&self, path: &str, expected: EntryKind) -> StorageResult<Entry> {
        let node = self.resolve(path)?;
        match (node, expected) {
            (TreeNode::Blob { data, .. }, EntryKind::Blob) => Ok(Entry::Blob(data.clone())),
            (TreeNode::Tree { .. }, EntryKind::Tree) => Ok(Entry::Tree(node.names())),
            (TreeNode::Submodule(id), EntryKind::Submodule) => Ok(Entry::Submodule(*id)),
            (found, expected) => Err(StorageError::TypeMismatch {
                path: path.to_string(),
                expected,
                found: found.kind(),
            }),
        }
    }

    /// store `data` at `path`, creating directories along the way
    ///
    /// Replacing an existing file keeps its mode. An existing blob in the
    /// middle of the path is an error rather than being silently replaced by
    /// a directory.
    pub fn insert(&mut self, path: &str, data: Vec<u8>) -> StorageResult<()> {
        let segments = split_path(path)?;
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;

        let mut node = self;
        for segment in parents {
            let found = node.kind();
            let children = node.children_mut().ok_or_else(|| StorageError::TypeMismatch {
                path: path.to_string(),
                expected: EntryKind::Tree,
                found,
            })?;
            node = children.entry(segment.to_string()).or_default();
        }

        let found = node.kind();
        let children = node.children_mut().ok_or_else(|| StorageError::TypeMismatch {
            path: path.to_string(),
            expected: EntryKind::Tree,
            found,
        })?;
        let mode = match children.get(*leaf) {
            Some(TreeNode::Blob { mode, .. }) => *mode,
            _ => REGULAR_FILE,
        };
        children.insert(leaf.to_string(), TreeNode::Blob { data, mode });
        Ok(())
    }
}

/// split on `/`, ignoring empty segments; an all-empty path is invalid
fn split_path(path: &str) -> StorageResult<Vec<&str>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    if segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}
