//! Git operations for release workflows.
//!
//! Shells out to `git` for all operations. This ensures we inherit the user's
//! credentials, SSH keys, and other configuration.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::version::Revision;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "fetch").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,

    /// `git describe` found no tag to describe from.
    #[error("no tag reachable from {0}")]
    NoTag(String),
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// A local checkout produced by [`SourceControl::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingTree {
    /// Checkout root.
    pub path: Utf8PathBuf,
}

/// Source control operations the release core needs.
pub trait SourceControl {
    /// Make `into` a checkout of `owner/repo` at `revision`.
    ///
    /// Clones when `into` does not exist yet, otherwise fetches into it.
    /// Tags are always fetched.
    fn fetch(
        &self,
        owner: &str,
        repo: &str,
        revision: &Revision,
        into: &Utf8Path,
    ) -> GitResult<WorkingTree>;

    /// Describe `HEAD` of `tree` from the nearest tag, optionally
    /// restricted to tags matching `pattern`.
    fn describe(&self, tree: &WorkingTree, pattern: Option<&str>) -> GitResult<String>;

    /// The tag pointing exactly at `HEAD` of `root`, if any.
    fn exact_tag_at(&self, root: &Utf8Path) -> GitResult<Option<String>>;

    /// Full commit hash of `HEAD` in `root`.
    fn head_commit(&self, root: &Utf8Path) -> GitResult<Revision>;

    /// Whether `owner/repo` has a tag named `tag`.
    fn remote_tag_exists(&self, owner: &str, repo: &str, tag: &str) -> GitResult<bool>;
}

/// [`SourceControl`] backed by the `git` binary, talking to GitHub.
#[derive(Debug, Clone)]
pub struct GitSourceControl {
    host: String,
}

impl GitSourceControl {
    /// Use `https://github.com` as the remote host.
    pub fn new() -> Self {
        Self::with_host("https://github.com")
    }

    /// Use a different remote host (e.g. a mirror).
    pub fn with_host(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Clone URL for `owner/repo`.
    pub fn remote_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/{owner}/{repo}.git", self.host.trim_end_matches('/'))
    }
}

impl Default for GitSourceControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceControl for GitSourceControl {
    #[instrument(skip(self, revision), fields(%revision))]
    fn fetch(
        &self,
        owner: &str,
        repo: &str,
        revision: &Revision,
        into: &Utf8Path,
    ) -> GitResult<WorkingTree> {
        let url = self.remote_url(owner, repo);

        if !into.join(".git").exists() {
            if let Some(parent) = into.parent()
                && !parent.as_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            debug!(%url, %into, "cloning");
            git(None, &["clone", "--quiet", &url, into.as_str()])?;
        }

        git(Some(into), &["fetch", "--quiet", "--tags", &url])?;
        git(Some(into), &["fetch", "--quiet", &url, revision.as_str()])?;
        git(Some(into), &["checkout", "-fq", "FETCH_HEAD"])?;
        git(Some(into), &["reset", "--hard", "--quiet"])?;

        debug!(%into, "checked out");
        Ok(WorkingTree {
            path: into.to_path_buf(),
        })
    }

    #[instrument(skip(self))]
    fn describe(&self, tree: &WorkingTree, pattern: Option<&str>) -> GitResult<String> {
        let match_arg = pattern.map(|p| format!("--match={p}"));
        let mut args = vec!["describe", "--tags"];
        if let Some(arg) = &match_arg {
            args.push(arg);
        }

        let described = match git(Some(&tree.path), &args) {
            Ok(out) => out.trim().to_string(),
            Err(GitError::Command { stderr, .. })
                if stderr.contains("No names found") || stderr.contains("No tags can describe") =>
            {
                return Err(GitError::NoTag(tree.path.to_string()));
            }
            Err(e) => return Err(e),
        };
        debug!(%described, "described");
        Ok(described)
    }

    #[instrument(skip(self))]
    fn exact_tag_at(&self, root: &Utf8Path) -> GitResult<Option<String>> {
        match git(Some(root), &["describe", "--tags", "--exact-match"]) {
            Ok(out) => {
                let tag = out.trim().to_string();
                debug!(%tag, "HEAD is tagged");
                Ok(Some(tag))
            }
            Err(GitError::Command { .. }) => {
                debug!("HEAD is not tagged");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    fn head_commit(&self, root: &Utf8Path) -> GitResult<Revision> {
        let sha = git(Some(root), &["rev-parse", "HEAD"])?.trim().to_string();
        Revision::new(sha).map_err(|e| GitError::Command {
            command: "rev-parse".into(),
            stderr: e.to_string(),
        })
    }

    #[instrument(skip(self))]
    fn remote_tag_exists(&self, owner: &str, repo: &str, tag: &str) -> GitResult<bool> {
        let url = self.remote_url(owner, repo);
        let refname = format!("refs/tags/{tag}");
        let output = git(None, &["ls-remote", "--tags", &url, &refname])?;
        let exists = output
            .lines()
            .any(|line| line.split_whitespace().nth(1) == Some(refname.as_str()));
        debug!(exists, "remote tag lookup");
        Ok(exists)
    }
}

/// Check if `dir` is inside a git repository.
#[instrument]
pub fn is_inside_repo(dir: &Utf8Path) -> GitResult<bool> {
    match git(Some(dir), &["rev-parse", "--is-inside-work-tree"]) {
        Ok(output) => Ok(output.trim() == "true"),
        Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Run a git command and return its stdout.
fn git(dir: Option<&Utf8Path>, args: &[&str]) -> GitResult<String> {
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.current_dir(dir.as_std_path());
    }
    let output = cmd.args(args).output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        Err(GitError::Command {
            command: args.first().unwrap_or(&"").to_string(),
            stderr,
        })
    }
}
