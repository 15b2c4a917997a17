//! Test-suite check backed by pytest
//!
//! Besides the pass/fail verdict this runner fingerprints the test files so a
//! verifier can tell whether the suite changed between envelopes.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use walkdir::WalkDir;

use super::process::{error_detail, second_token, Tool};
use super::{CheckResult, CheckRunner, RunnerKind};
use crate::integrity::hash_files;

const PROGRAM: &str = "pytest";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Directories searched for `test_*.py`, in hashing order
const TEST_DIRS: [&str; 2] = ["tests", "test"];

/// Hex characters kept from the suite digest
const SUITE_HASH_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct PytestRunner {
    tool: Tool,
    timeout: Duration,
}

impl PytestRunner {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tool: Tool::new(PROGRAM),
            timeout,
        }
    }

    /// Use this executable instead of `pytest` from `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.tool = self.tool.with_program(program);
        self
    }
}

impl Default for PytestRunner {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

/// Test files under `tests/` then `test/`, each directory sorted by path
fn collect_test_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for dir in TEST_DIRS {
        let dir = root.join(dir);
        if !dir.is_dir() {
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(&dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy();
                name.starts_with("test_") && name.ends_with(".py")
            })
            .map(|entry| entry.into_path())
            .collect();
        found.sort();
        files.extend(found);
    }

    files
}

/// Fingerprint of the test suite, or `None` when there are no test files
pub fn suite_fingerprint(root: &Path) -> Option<String> {
    let files = collect_test_files(root);
    if files.is_empty() {
        return None;
    }

    match hash_files(&files) {
        Ok(digest) => Some(digest[..SUITE_HASH_LEN].to_string()),
        Err(e) => {
            warn!("Could not fingerprint test suite: {}", e);
            None
        }
    }
}

/// Last line of pytest's summary output
fn summary_line(stdout: &str) -> String {
    stdout
        .trim()
        .lines()
        .last()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "No output".to_string())
}

#[async_trait]
impl CheckRunner for PytestRunner {
    fn name(&self) -> &str {
        RunnerKind::Test.as_str()
    }

    fn is_available(&self) -> bool {
        self.tool.is_available()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, repo_root: &Path) -> CheckResult {
        let root = repo_root.to_path_buf();
        let suite_hash = tokio::task::spawn_blocking(move || suite_fingerprint(&root))
            .await
            .unwrap_or(None);

        let (outcome, version) = self
            .tool
            .run_versioned(&["--tb=no", "-q"], repo_root, self.timeout)
            .await;
        let tool_name = self.tool.versioned_name(version.as_deref().and_then(second_token));

        let result = match outcome {
            Ok(output) if output.success => {
                CheckResult::passed(tool_name, summary_line(&output.stdout))
            }
            Ok(output) => CheckResult::failed(tool_name, summary_line(&output.stdout)),
            Err(e) => CheckResult::failed(tool_name, error_detail("Test suite", &e)),
        };

        result.with_suite_hash(suite_hash)
    }
}
