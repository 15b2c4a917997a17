//! Lint check backed by ruff

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::process::{error_detail, second_token, truncate_detail, Tool};
use super::{CheckResult, CheckRunner, RunnerKind};

const PROGRAM: &str = "ruff";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RuffRunner {
    tool: Tool,
    timeout: Duration,
}

impl RuffRunner {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tool: Tool::new(PROGRAM),
            timeout,
        }
    }

    /// Use this executable instead of `ruff` from `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.tool = self.tool.with_program(program);
        self
    }
}

impl Default for RuffRunner {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl CheckRunner for RuffRunner {
    fn name(&self) -> &str {
        RunnerKind::Lint.as_str()
    }

    fn is_available(&self) -> bool {
        self.tool.is_available()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, repo_root: &Path) -> CheckResult {
        let (outcome, version) = self
            .tool
            .run_versioned(&["check", "."], repo_root, self.timeout)
            .await;
        let tool_name = self.tool.versioned_name(version.as_deref().and_then(second_token));

        match outcome {
            Ok(output) if output.success => CheckResult::passed(tool_name, "No issues found"),
            Ok(output) => CheckResult::failed(tool_name, truncate_detail(&output.stdout)),
            Err(e) => CheckResult::failed(tool_name, error_detail("Ruff", &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_run_passes_with_version() {
        use crate::checks::stub::{recorded_args, StubTool};

        let bin = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let program = StubTool {
            version: Some("ruff 0.4.2"),
            stdout: "All checks passed!",
            stderr: "",
            exit_code: 0,
        }
        .install(bin.path(), "ruff");

        let runner = RuffRunner::default().with_program(program);
        assert!(runner.is_available());

        let result = runner.run(repo.path()).await;
        assert!(result.passed);
        assert_eq!(result.tool_name, "ruff@0.4.2");
        assert_eq!(result.detail, "No issues found");
        assert_eq!(result.suite_hash, None);
        assert_eq!(recorded_args(repo.path()), "check .");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_findings_fail_with_truncated_detail() {
        use crate::checks::process::DETAIL_LIMIT;
        use crate::checks::stub::StubTool;

        let bin = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let findings = "app.py:1:1: F401 `os` imported but unused ".repeat(10);
        let program = StubTool {
            version: Some("ruff 0.4.2"),
            stdout: &findings,
            stderr: "",
            exit_code: 1,
        }
        .install(bin.path(), "ruff");

        let result = RuffRunner::default().with_program(program).run(repo.path()).await;
        assert!(!result.passed);
        assert_eq!(result.detail.chars().count(), DETAIL_LIMIT);
        assert!(findings.starts_with(&result.detail));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_version_reported_as_unknown() {
        use crate::checks::stub::StubTool;

        let bin = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let program = StubTool {
            version: None,
            stdout: "",
            stderr: "",
            exit_code: 0,
        }
        .install(bin.path(), "ruff");

        let result = RuffRunner::default().with_program(program).run(repo.path()).await;
        assert!(result.passed);
        assert_eq!(result.tool_name, "ruff@unknown");
    }
}
