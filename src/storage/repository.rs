//!   Git repository handle.
//!
//!  A [`Repository`] is a validated path to a bare or working-tree
//!  repository. Plumbing that touches remotes or refs goes through the git
//!  binary via [`GitRunner`]; object writes for commits go through libgit2 in
//!  [`CommitTransaction`].

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::retry::RetryPolicy;
use crate::storage::commit::{CommitInfo, CommitTransaction};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::runner::{describe, to_args, GitRunner, SystemGit};
use crate::storage::types::{CommitId, Identity};

/// Branch that HEAD points at in repositories we create, and the default
/// tag target.
pub const DEFAULT_BRANCH: &str = "master";

/// An on-disk git repository.
pub struct Repository {
    root: PathBuf,
    bare: bool,
    runner: Arc<dyn GitRunner>,
    retry: RetryPolicy,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("bare", &self.bare)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Open an existing repository, checking its layout first.
    pub fn open(root: impl Into<PathBuf>, bare: bool) -> StorageResult<Self> {
        Self::open_with(root, bare, SystemGit::shared())
    }

    /// Open with a custom git runner.
    pub fn open_with(root: impl Into<PathBuf>, bare: bool, runner: Arc<dyn GitRunner>) -> StorageResult<Self> {
        let root = root.into();
        validate_structure(&root, bare)?;
        Ok(Self::unchecked(root, bare, runner))
    }

    /// Initialize a new repository, creating the directory if needed.
    ///
    /// A fresh repository gets HEAD on `master`. Re-running `git init` on an
    /// existing one leaves its HEAD where it was.
    pub fn create(root: impl Into<PathBuf>, bare: bool) -> StorageResult<Self> {
        Self::create_with(root, bare, SystemGit::shared())
    }

    /// Initialize with a custom git runner.
    pub fn create_with(root: impl Into<PathBuf>, bare: bool, runner: Arc<dyn GitRunner>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let existing = validate_structure(&root, bare).is_ok();

        let repo = Self::unchecked(root, bare, runner);
        if bare {
            repo.git(["init", "--bare"])?;
        } else {
            repo.git(["init"])?;
        }
        if !existing {
            let head = format!("refs/heads/{DEFAULT_BRANCH}");
            repo.git(["symbolic-ref", "HEAD", head.as_str()])?;
        }

        validate_structure(&repo.root, bare)?;
        info!(root = %repo.root.display(), bare, existing, "created repository");
        Ok(repo)
    }

    /// Clone `source` into `destination` under `retry`, then validate.
    pub fn clone(
        source: &str,
        destination: impl Into<PathBuf>,
        bare: bool,
        retry: &RetryPolicy,
    ) -> StorageResult<Self> {
        Self::clone_with(source, destination, bare, retry, SystemGit::shared())
    }

    /// Clone with a custom git runner.
    pub fn clone_with(
        source: &str,
        destination: impl Into<PathBuf>,
        bare: bool,
        retry: &RetryPolicy,
        runner: Arc<dyn GitRunner>,
    ) -> StorageResult<Self> {
        let destination = destination.into();
        let mut args = to_args([OsStr::new("clone"), OsStr::new(source), destination.as_os_str()]);
        if bare {
            args.push("--bare".into());
        }

        retry.retry(&format!("cloning {source}"), || {
            runner.run(Path::new("."), &args, &[])
        })?;

        validate_structure(&destination, bare)?;
        info!(%source, root = %destination.display(), bare, "cloned repository");
        Ok(Self::unchecked(destination, bare, runner).with_retry(retry.clone()))
    }

    fn unchecked(root: PathBuf, bare: bool, runner: Arc<dyn GitRunner>) -> Self {
        Self {
            root,
            bare,
            runner,
            retry: RetryPolicy::default(),
        }
    }

    /// Use `retry` for pull and push.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_bare(&self) -> bool {
        self.bare
    }

    // ==================== Git plumbing ====================

    /// Run a git subcommand in the repository root and return its output.
    pub fn git<I, S>(&self, args: I) -> StorageResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.runner.run(&self.root, &to_args(args), &[])
    }

    /// Run with extra environment for this one child process.
    pub(crate) fn git_with_env<I, S>(&self, args: I, env: &[(String, String)]) -> StorageResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.runner.run(&self.root, &to_args(args), env)
    }

    /// `git remote add <name> <url>`
    pub fn remote_add(&self, name: &str, url: &str) -> StorageResult<()> {
        self.git(["remote", "add", name, url])?;
        Ok(())
    }

    /// `git remote rm <name>`
    pub fn remote_remove(&self, name: &str) -> StorageResult<()> {
        self.git(["remote", "rm", name])?;
        Ok(())
    }

    /// `git pull --no-rebase <args>`, retried.
    ///
    /// A merge conflict is retried just like a network failure; git gives us
    /// no reliable way to tell them apart.
    pub fn pull<I, S>(&self, args: I) -> StorageResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut full = to_args(["pull", "--no-rebase"]);
        full.extend(to_args(args));
        self.run_retried(&full)
    }

    /// `git push <args>`, retried.
    pub fn push<I, S>(&self, args: I) -> StorageResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut full = to_args(["push"]);
        full.extend(to_args(args));
        self.run_retried(&full)
    }

    fn run_retried(&self, args: &[std::ffi::OsString]) -> StorageResult<String> {
        let task = describe(args);
        self.retry
            .retry(&task, || self.runner.run(&self.root, args, &[]))
    }

    /// `git commit -a -m <message>` in a working tree.
    ///
    /// Returns `Ok(false)` when git reports nothing to commit.
    pub fn commit_all(&self, message: &str) -> StorageResult<bool> {
        match self.git(["commit", "-a", "-m", message]) {
            Ok(_) => Ok(true),
            Err(StorageError::Git { output, .. }) if output.contains("nothing to commit") => {
                info!(root = %self.root.display(), "no changes to commit");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    // ==================== Commits ====================

    /// Start a commit transaction on top of HEAD.
    pub fn transaction(&self) -> StorageResult<CommitTransaction<'_>> {
        CommitTransaction::open(self)
    }

    /// Build and finalize a commit in one go.
    ///
    /// Nothing is written if `build` fails.
    pub fn commit<F>(&self, message: &str, author: &Identity, build: F) -> StorageResult<Option<CommitId>>
    where
        F: FnOnce(&mut CommitTransaction<'_>) -> StorageResult<()>,
    {
        let mut tx = self.transaction()?;
        build(&mut tx)?;
        tx.finalize(message, author, None)
    }

    /// The commit HEAD points at, or None for an empty repository.
    pub fn head(&self) -> StorageResult<Option<CommitId>> {
        Self::head_of(&self.open_objects()?)
    }

    /// Decode a commit.
    pub fn commit_info(&self, id: CommitId) -> StorageResult<CommitInfo> {
        let git = self.open_objects()?;
        let commit = git.find_commit(id.raw())?;
        Ok(CommitInfo::from_git2(&commit))
    }

    pub(crate) fn open_objects(&self) -> StorageResult<git2::Repository> {
        if self.bare {
            Ok(git2::Repository::open_bare(&self.root)?)
        } else {
            Ok(git2::Repository::open(&self.root)?)
        }
    }

    pub(crate) fn head_of(git: &git2::Repository) -> StorageResult<Option<CommitId>> {
        match git.head() {
            Ok(head) => Ok(Some(CommitId::new(head.peel_to_commit()?.id()))),
            Err(e) if matches!(e.code(), git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(StorageError::Libgit2(e)),
        }
    }
}

/// Bare repositories must have `objects/`; working trees `.git/objects/`.
fn validate_structure(root: &Path, bare: bool) -> StorageResult<()> {
    let markers = if bare {
        vec![root.to_path_buf(), root.join("objects")]
    } else {
        vec![root.to_path_buf(), root.join(".git"), root.join(".git").join("objects")]
    };
    for marker in markers {
        if !marker.is_dir() {
            return Err(StorageError::missing(root, &marker));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::runner::testing::RecordingGit;
    use tempfile::TempDir;

    fn author() -> Identity {
        Identity::new("test author", "testemail@example.com")
    }

    fn recorded(bare: bool) -> (TempDir, Repository, Arc<RecordingGit>) {
        let dir = TempDir::new().unwrap();
        let real = Repository::create(dir.path().join("repo"), bare).unwrap();
        let recorder = RecordingGit::new();
        let repo = Repository::open_with(real.root(), bare, recorder.clone())
            .unwrap()
            .with_retry(RetryPolicy::new(3, std::time::Duration::ZERO));
        (dir, repo, recorder)
    }

    #[test]
    fn test_create_and_open() {
        let dir = TempDir::new().unwrap();
        let bare = Repository::create(dir.path().join("bare"), true).unwrap();
        assert!(bare.is_bare());
        assert!(Repository::open(bare.root(), true).is_ok());

        let work = Repository::create(dir.path().join("work"), false).unwrap();
        assert!(!work.is_bare());
        assert!(Repository::open(work.root(), false).is_ok());
        assert_eq!(work.head().unwrap(), None);
    }

    #[test]
    fn test_open_wrong_kind_is_structure_error() {
        let dir = TempDir::new().unwrap();
        let bare = Repository::create(dir.path().join("bare"), true).unwrap();
        let work = Repository::create(dir.path().join("work"), false).unwrap();

        let err = Repository::open(work.root(), true).unwrap_err();
        assert!(err.is_structural());
        let err = Repository::open(bare.root(), false).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_open_plain_directory_mentions_nonexistence() {
        let dir = TempDir::new().unwrap();
        let err = Repository::open(dir.path(), false).unwrap_err();
        assert!(err.is_structural());
        assert!(err.to_string().contains("does not exist"));

        let err = Repository::open(dir.path().join("missing"), true).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_create_points_head_at_master() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::create(dir.path().join("repo"), true).unwrap();
        let head = repo.git(["symbolic-ref", "HEAD"]).unwrap();
        assert_eq!(head.trim(), "refs/heads/master");
    }

    #[test]
    fn test_create_over_existing_keeps_head() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::create(dir.path().join("repo"), false).unwrap();
        repo.git(["symbolic-ref", "HEAD", "refs/heads/main"]).unwrap();
        let first = repo
            .commit("initial commit", &author(), |tx| tx.add("README", "readme\n"))
            .unwrap();

        let again = Repository::create(repo.root(), false).unwrap();
        assert_eq!(again.git(["symbolic-ref", "HEAD"]).unwrap().trim(), "refs/heads/main");
        assert_eq!(again.head().unwrap(), first);
    }

    #[test]
    fn test_remotes_added_and_removed() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::create(dir.path().join("repo"), true).unwrap();
        repo.commit("initial commit", &author(), |tx| {
            tx.add("README", "This is a test readme file\n")
        })
        .unwrap();

        repo.remote_add("origin", "http://example.com/").unwrap();
        assert_eq!(repo.git(["remote"]).unwrap(), "origin\n");
        repo.remote_remove("origin").unwrap();
        assert_eq!(repo.git(["remote"]).unwrap(), "");
    }

    #[test]
    fn test_pull_passes_no_rebase() {
        let (_dir, repo, recorder) = recorded(false);
        repo.pull(["origin", "master"]).unwrap();
        assert_eq!(recorder.args(), vec![vec!["pull", "--no-rebase", "origin", "master"]]);
    }

    #[test]
    fn test_push_retries_until_success() {
        let (_dir, repo, recorder) = recorded(true);
        recorder.fail_with("fatal: unable to access 'https://example.com/'");
        repo.push(["origin", "master"]).unwrap();
        assert_eq!(
            recorder.args(),
            vec![vec!["push", "origin", "master"], vec!["push", "origin", "master"]]
        );
    }

    #[test]
    fn test_push_surfaces_last_error() {
        let (_dir, repo, recorder) = recorded(true);
        for n in 1..=3 {
            recorder.fail_with(&format!("attempt {n}"));
        }
        let err = repo.push(["origin", "master"]).unwrap_err();
        assert_eq!(err.git_output(), Some("attempt 3"));
        assert_eq!(recorder.args().len(), 3);
    }

    #[test]
    fn test_clone_then_validate() {
        let dir = TempDir::new().unwrap();
        let source = Repository::create(dir.path().join("source"), true).unwrap();
        source
            .commit("initial commit", &author(), |tx| tx.add("README", "hello"))
            .unwrap();

        let url = source.root().to_string_lossy().into_owned();
        let copy = Repository::clone(&url, dir.path().join("copy"), true, &RetryPolicy::once()).unwrap();
        assert!(copy.is_bare());
        assert_eq!(copy.head().unwrap(), source.head().unwrap());

        let work = Repository::clone(&url, dir.path().join("work"), false, &RetryPolicy::once()).unwrap();
        assert!(work.root().join("README").is_file());
    }

    #[test]
    fn test_clone_retries_through_policy() {
        let dir = TempDir::new().unwrap();
        let recorder = RecordingGit::new();
        recorder.fail_with("Could not resolve host");
        recorder.fail_with("Could not resolve host");

        let policy = RetryPolicy::new(2, std::time::Duration::ZERO);
        let err = Repository::clone_with(
            "https://example.invalid/repo.git",
            dir.path().join("dest"),
            true,
            &policy,
            recorder.clone(),
        )
        .unwrap_err();

        assert_eq!(err.git_output(), Some("Could not resolve host"));
        let calls = recorder.args();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0][0], "clone");
        assert_eq!(calls[0].last().map(String::as_str), Some("--bare"));
    }

    #[test]
    fn test_commit_all() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::create(dir.path().join("repo"), false).unwrap();
        repo.commit("initial commit", &author(), |tx| tx.add("README", "one\n"))
            .unwrap();
        repo.git(["config", "user.name", "test author"]).unwrap();
        repo.git(["config", "user.email", "testemail@example.com"]).unwrap();
        repo.git(["reset", "--hard"]).unwrap();

        assert!(!repo.commit_all("nothing").unwrap());

        std::fs::write(repo.root().join("README"), "two\n").unwrap();
        assert!(repo.commit_all("update readme").unwrap());
        let log = repo.git(["log", "--format=%s", "-1"]).unwrap();
        assert_eq!(log.trim(), "update readme");
    }

    #[test]
    fn test_failed_build_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::create(dir.path().join("repo"), true).unwrap();
        let err = repo
            .commit("broken", &author(), |tx| {
                tx.add("README", "fine")?;
                tx.add_optional("LICENSE", None)
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::NoData { .. }));
        assert_eq!(repo.head().unwrap(), None);
    }
}
