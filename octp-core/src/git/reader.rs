use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use super::{RepoInfo, RepositoryProvider, DETACHED_BRANCH, UNKNOWN_REPOSITORY};
use crate::error::{OctpError, Result};

/// `git@github.com:org/repo.git`
static SSH_REMOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:ssh://)?git@([^:/]+)[:/](.+?)(?:\.git)?/?$").expect("valid remote pattern")
});

/// `https://github.com/org/repo.git`, with optional credentials
static HTTPS_REMOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:[^@/]+@)?([^/]+)/(.+?)(?:\.git)?/?$").expect("valid remote pattern")
});

/// Normalize a remote URL to `host/org/repo`. Unrecognized formats are
/// returned unchanged.
pub fn normalize_remote(url: &str) -> String {
    let url = url.trim();
    for pattern in [&*SSH_REMOTE, &*HTTPS_REMOTE] {
        if let Some(caps) = pattern.captures(url) {
            return format!("{}/{}", &caps[1], &caps[2]);
        }
    }
    url.to_string()
}

/// Reads repository state through the `git` command line
#[derive(Debug, Clone, Default)]
pub struct GitRepository;

impl GitRepository {
    pub fn new() -> Self {
        Self
    }
}

/// Run git in `dir`; `Ok(None)` when git ran but exited non-zero
pub(super) fn git(dir: &Path, args: &[&str]) -> std::io::Result<Option<String>> {
    let output = Command::new("git").args(args).current_dir(dir).output()?;
    if !output.status.success() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
}

impl RepositoryProvider for GitRepository {
    fn read(&self, path: &Path) -> Result<RepoInfo> {
        let unavailable = |reason: String| OctpError::RepositoryUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let root = git(path, &["rev-parse", "--show-toplevel"])
            .map_err(|e| unavailable(format!("could not run git: {e}")))?
            .ok_or_else(|| unavailable("not inside a git repository".to_string()))?;
        let root = PathBuf::from(root);

        let commit_hash = git(&root, &["rev-parse", "--verify", "HEAD"])
            .map_err(|e| unavailable(format!("could not run git: {e}")))?
            .ok_or_else(|| unavailable("repository has no commits".to_string()))?;

        let branch = git(&root, &["symbolic-ref", "--quiet", "--short", "HEAD"])
            .ok()
            .flatten()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DETACHED_BRANCH.to_string());

        let repository = git(&root, &["remote", "get-url", "origin"])
            .ok()
            .flatten()
            .filter(|url| !url.is_empty())
            .map(|url| normalize_remote(&url))
            .unwrap_or_else(|| UNKNOWN_REPOSITORY.to_string());

        debug!(
            "Read repository {} at {} (branch {})",
            repository, commit_hash, branch
        );

        Ok(RepoInfo {
            commit_hash,
            repository,
            branch,
            root,
        })
    }
}
