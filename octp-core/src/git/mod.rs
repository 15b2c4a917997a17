//! Repository metadata and developer identity
//!
//! The envelope builder only consumes [`RepoInfo`] and a developer id
//! string. Where they come from sits behind [`RepositoryProvider`] and
//! [`IdentityResolver`]; the git-backed implementations here shell out to the
//! `git` binary.

mod identity;
mod reader;

pub use identity::GitIdentityResolver;
pub use reader::{normalize_remote, GitRepository};

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Repository identifier used when there is no `origin` remote
pub const UNKNOWN_REPOSITORY: &str = "unknown/unknown/unknown";

/// Branch name reported for a detached HEAD
pub const DETACHED_BRANCH: &str = "detached";

/// Developer id reported when no identity source is configured
pub const UNKNOWN_DEVELOPER: &str = "unknown";

/// State of the working copy at signing time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub commit_hash: String,
    /// `host/org/repo`
    pub repository: String,
    pub branch: String,
    pub root: PathBuf,
}

/// Supplies repository metadata for a path inside a working copy
pub trait RepositoryProvider {
    fn read(&self, path: &Path) -> Result<RepoInfo>;
}

/// Turns local configuration into a prefixed developer id
pub trait IdentityResolver {
    fn resolve(&self, repo_root: &Path) -> String;
}
