use std::path::Path;
use tracing::debug;

use super::reader::git;
use super::{IdentityResolver, UNKNOWN_DEVELOPER};

/// Config keys consulted in order, with the prefix each one produces
const IDENTITY_SOURCES: [(&str, &str); 3] = [
    ("github.user", "github"),
    ("user.email", "email"),
    ("user.name", "git"),
];

/// Resolves the developer id from git configuration
#[derive(Debug, Clone, Default)]
pub struct GitIdentityResolver;

impl GitIdentityResolver {
    pub fn new() -> Self {
        Self
    }
}

/// First non-empty identity source wins; `unknown` when none is set
pub(crate) fn resolve_with<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    IDENTITY_SOURCES
        .iter()
        .find_map(|&(key, prefix)| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(|value| format!("{prefix}:{value}"))
        })
        .unwrap_or_else(|| UNKNOWN_DEVELOPER.to_string())
}

impl IdentityResolver for GitIdentityResolver {
    fn resolve(&self, repo_root: &Path) -> String {
        let id = resolve_with(|key| git(repo_root, &["config", "--get", key]).ok().flatten());
        debug!("Resolved developer id {}", id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_github_user_preferred() {
        let id = resolve_with(lookup(&[
            ("github.user", "octocat"),
            ("user.email", "octo@example.com"),
            ("user.name", "Octo Cat"),
        ]));
        assert_eq!(id, "github:octocat");
    }

    #[test]
    fn test_email_then_name() {
        let id = resolve_with(lookup(&[
            ("user.email", "dev@example.com"),
            ("user.name", "Dev"),
        ]));
        assert_eq!(id, "email:dev@example.com");

        let id = resolve_with(lookup(&[("user.name", "Dev")]));
        assert_eq!(id, "git:Dev");
    }

    #[test]
    fn test_blank_values_skipped() {
        let id = resolve_with(lookup(&[("github.user", "  "), ("user.name", "Dev")]));
        assert_eq!(id, "git:Dev");
    }

    #[test]
    fn test_nothing_configured() {
        assert_eq!(resolve_with(lookup(&[])), "unknown");
    }

    #[test]
    fn test_reads_repository_config() {
        if which::which("git").is_err() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let ok = |args: &[&str]| {
            std::process::Command::new("git")
                .args(args)
                .current_dir(dir)
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        };
        assert!(ok(&["init", "-q"]));
        assert!(ok(&["config", "github.user", "repo-local-user"]));

        let id = GitIdentityResolver::new().resolve(dir);
        assert_eq!(id, "github:repo-local-user");
    }
}
