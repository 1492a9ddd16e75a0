//!  Annotated tags.
//!
//!  Tags are created with `git tag -a`, so git itself validates the name and
//!  writes the tag object. The tagger identity reaches git through
//!  `GIT_COMMITTER_*` variables set on that one child process only; the
//!  parent's environment is never touched.

use tracing::info;

use crate::storage::error::StorageResult;
use crate::storage::repository::{Repository, DEFAULT_BRANCH};
use crate::storage::types::Identity;

/// An annotated tag to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub message: String,
    pub tagger: Identity,
    /// what the tag points at, `master` unless overridden
    pub target: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, message: impl Into<String>, tagger: Identity) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            tagger,
            target: DEFAULT_BRANCH.to_string(),
        }
    }

    /// point the tag at another branch or commit
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }
}

/// Whether `name` is acceptable as `refs/tags/<name>`.
///
/// git itself refuses tag names that start with `-`, although the ref
/// would be well formed.
pub fn is_valid_tag_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && git2::Reference::is_valid_name(&format!("refs/tags/{name}"))
}

/// The committer variables git reads when writing a tag object.
fn committer_env(tagger: &Identity) -> Vec<(String, String)> {
    vec![
        ("GIT_COMMITTER_NAME".to_string(), tagger.name.clone()),
        ("GIT_COMMITTER_EMAIL".to_string(), tagger.email.clone()),
        ("GIT_COMMITTER_DATE".to_string(), tagger.git_date()),
    ]
}

impl Repository {
    /// `git tag -a -m <message> -- <name> <target>` as the tagger.
    ///
    /// An invalid name comes back as [`StorageError::Git`](crate::storage::StorageError::Git)
    /// with git's own message; nothing is written in that case. The name
    /// follows `--` so git never reads it as an option.
    pub fn create_tag(&self, tag: &Tag) -> StorageResult<()> {
        self.git_with_env(
            [
                "tag",
                "-a",
                "-m",
                tag.message.as_str(),
                "--",
                tag.name.as_str(),
                tag.target.as_str(),
            ],
            &committer_env(&tag.tagger),
        )?;
        info!(root = %self.root().display(), tag = %tag.name, target = %tag.target, "created tag");
        Ok(())
    }

    /// The tag's name if it exists; `None` if it doesn't or can't.
    pub fn find_tag(&self, name: &str) -> StorageResult<Option<String>> {
        if !is_valid_tag_name(name) {
            return Ok(None);
        }
        let listed = self.git(["tag", "-l", name])?;
        Ok(listed
            .lines()
            .map(str::trim)
            .find(|line| *line == name)
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::runner::testing::RecordingGit;
    use crate::storage::StorageError;
    use chrono::{FixedOffset, TimeZone};
    use tempfile::TempDir;

    fn tagger() -> Identity {
        let when = FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2010, 10, 10, 16, 40, 0)
            .unwrap();
        Identity::new("test tagger", "tagger@example.com").at(when)
    }

    fn repo_with_commit() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::create(dir.path().join("repo"), true).unwrap();
        repo.commit("initial commit", &Identity::new("a", "a@example.com"), |tx| {
            tx.add("README", "This is a test readme file\n")
        })
        .unwrap();
        (dir, repo)
    }

    #[test]
    fn test_tag_date_has_padded_offset() {
        let (_dir, repo) = repo_with_commit();
        repo.create_tag(&Tag::new("1.0", "release 1.0", tagger())).unwrap();

        let object = repo.git(["cat-file", "-p", "1.0"]).unwrap();
        assert!(object.contains("tagger test tagger <tagger@example.com> 1286754000 -0700"));
        assert!(!object.contains(" -700"));
        assert!(object.contains("release 1.0"));
        assert_eq!(repo.git(["cat-file", "-t", "1.0"]).unwrap().trim(), "tag");
    }

    #[test]
    fn test_invalid_name_fails_and_changes_nothing() {
        let (_dir, repo) = repo_with_commit();
        let err = repo.create_tag(&Tag::new("bad name", "nope", tagger())).unwrap_err();
        match err {
            StorageError::Git { output, .. } => assert!(output.contains("not a valid tag name")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(repo.git(["tag", "-l"]).unwrap(), "");
    }

    #[test]
    fn test_option_like_name_is_rejected() {
        let (_dir, repo) = repo_with_commit();
        let err = repo.create_tag(&Tag::new("-f", "msg", tagger())).unwrap_err();
        match err {
            StorageError::Git { output, .. } => assert!(output.contains("not a valid tag name")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(repo.git(["tag", "-l"]).unwrap(), "");
        assert_eq!(repo.find_tag("-f").unwrap(), None);
    }

    #[test]
    fn test_existing_committer_environment_is_kept() {
        const VARS: [(&str, &str); 3] = [
            ("GIT_COMMITTER_NAME", "outer committer"),
            ("GIT_COMMITTER_EMAIL", "outer@example.com"),
            ("GIT_COMMITTER_DATE", "1000000000 +0000"),
        ];
        for (key, value) in VARS {
            std::env::set_var(key, value);
        }

        let (_dir, repo) = repo_with_commit();
        repo.create_tag(&Tag::new("ok", "fine", tagger())).unwrap();
        let _ = repo.create_tag(&Tag::new("not ok", "broken", tagger()));

        let after: Vec<_> = VARS.iter().map(|(key, _)| std::env::var(key).ok()).collect();
        for (key, _) in VARS {
            std::env::remove_var(key);
        }

        let expected: Vec<_> = VARS.iter().map(|(_, value)| Some(value.to_string())).collect();
        assert_eq!(after, expected);

        // the tag still carries the tagger, not the inherited identity
        let object = repo.git(["cat-file", "-p", "ok"]).unwrap();
        assert!(object.contains("tagger test tagger <tagger@example.com> 1286754000 -0700"));
    }

    #[test]
    fn test_tagger_passed_as_child_env() {
        let dir = TempDir::new().unwrap();
        let real = Repository::create(dir.path().join("repo"), true).unwrap();
        let recorder = RecordingGit::new();
        let repo = Repository::open_with(real.root(), true, recorder.clone()).unwrap();

        repo.create_tag(&Tag::new("2.0", "msg", tagger()).target("stable")).unwrap();

        let calls = recorder.calls.lock();
        assert_eq!(calls[0].args, vec!["tag", "-a", "-m", "msg", "--", "2.0", "stable"]);
        assert!(calls[0]
            .env
            .contains(&("GIT_COMMITTER_DATE".to_string(), "1286754000 -0700".to_string())));
        assert!(calls[0]
            .env
            .contains(&("GIT_COMMITTER_NAME".to_string(), "test tagger".to_string())));
    }

    #[test]
    fn test_find_tag() {
        let (_dir, repo) = repo_with_commit();
        repo.create_tag(&Tag::new("1.0", "release", tagger())).unwrap();

        assert_eq!(repo.find_tag("1.0").unwrap(), Some("1.0".to_string()));
        assert_eq!(repo.find_tag("2.0").unwrap(), None);
        assert_eq!(repo.find_tag("bad name").unwrap(), None);
        assert_eq!(repo.find_tag("").unwrap(), None);
    }

    #[test]
    fn test_tag_name_validity() {
        assert!(is_valid_tag_name("1.0"));
        assert!(is_valid_tag_name("v2.3-beta"));
        assert!(!is_valid_tag_name("bad name"));
        assert!(!is_valid_tag_name("a..b"));
        assert!(!is_valid_tag_name("trailing."));
        assert!(!is_valid_tag_name("-f"));
        assert!(is_valid_tag_name("f-1"));
    }
}
