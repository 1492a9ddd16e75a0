//! Git subprocess execution.
//!
//! Everything the repository does through the `git` binary goes through the
//! [`GitRunner`] trait, so tests can swap in a recorder and check exactly
//! which commands would have run.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::debug;

use crate::config::GitSettings;
use crate::storage::error::{StorageError, StorageResult};

/// Runs one git invocation and hands back its combined output.
pub trait GitRunner: Send + Sync {
    /// Run `git <args>` inside `dir` with `env` added to the child's
    /// environment only.
    ///
    /// Returns stdout followed by stderr on success, and
    /// [`StorageError::Git`] carrying the same text on a non-zero exit.
    fn run(&self, dir: &Path, args: &[OsString], env: &[(String, String)]) -> StorageResult<String>;
}

/// The system `git` binary.
#[derive(Debug, Clone)]
pub struct SystemGit {
    program: PathBuf,
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new("git")
    }
}

impl SystemGit {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_settings(settings: &GitSettings) -> Self {
        Self::new(&settings.program)
    }

    /// a shareable default runner
    pub fn shared() -> Arc<dyn GitRunner> {
        Arc::new(Self::default())
    }
}

impl GitRunner for SystemGit {
    fn run(&self, dir: &Path, args: &[OsString], env: &[(String, String)]) -> StorageResult<String> {
        let command = describe(args);
        debug!(%command, dir = %dir.display(), "running git");

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in env {
            cmd.env(key, value);
        }

        let output = cmd.output().map_err(|source| StorageError::Spawn {
            command: command.clone(),
            source,
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            debug!(%command, status = %output.status, "git failed");
            return Err(StorageError::Git {
                command,
                output: combined,
            });
        }

        Ok(combined)
    }
}

/// the human-readable form of an invocation, for errors and logs
pub fn describe(args: &[OsString]) -> String {
    let mut text = String::from("git");
    for arg in args {
        text.push(' ');
        text.push_str(&arg.to_string_lossy());
    }
    text
}

/// collect anything string-like into the argument vector runners take
pub(crate) fn to_args<I, S>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    args.into_iter().map(|a| a.as_ref().to_os_string()).collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_describe() {
        let args = to_args(["push", "origin", "master"]);
        assert_eq!(describe(&args), "git push origin master");
    }

    #[test]
    fn test_system_git_captures_output() {
        let dir = TempDir::new().unwrap();
        let out = SystemGit::default()
            .run(dir.path(), &to_args(["--version"]), &[])
            .unwrap();
        assert!(out.starts_with("git version"));
    }

    #[test]
    fn test_from_settings_uses_configured_program() {
        let dir = TempDir::new().unwrap();
        let git = SystemGit::from_settings(&GitSettings::default());
        assert!(git.run(dir.path(), &to_args(["--version"]), &[]).is_ok());

        let broken = SystemGit::from_settings(&GitSettings {
            program: "/nonexistent/git-binary".into(),
        });
        assert!(broken.run(dir.path(), &to_args(["--version"]), &[]).is_err());
    }

    #[test]
    fn test_system_git_reports_failure() {
        let dir = TempDir::new().unwrap();
        let err = SystemGit::default()
            .run(dir.path(), &to_args(["rev-parse", "HEAD"]), &[])
            .unwrap_err();
        match err {
            StorageError::Git { command, output } => {
                assert_eq!(command, "git rev-parse HEAD");
                assert!(!output.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let err = SystemGit::new("/nonexistent/git-binary")
            .run(dir.path(), &to_args(["status"]), &[])
            .unwrap_err();
        assert!(matches!(err, StorageError::Spawn { .. }));
    }
}
