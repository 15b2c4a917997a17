//! Fast static security scan backed by bandit (medium severity and up)

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::process::{error_detail, truncate_detail, Tool};
use super::{CheckResult, CheckRunner, RunnerKind};

const PROGRAM: &str = "bandit";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct BanditRunner {
    tool: Tool,
    timeout: Duration,
}

impl BanditRunner {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tool: Tool::new(PROGRAM),
            timeout,
        }
    }

    /// Use this executable instead of `bandit` from `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.tool = self.tool.with_program(program);
        self
    }
}

impl Default for BanditRunner {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl CheckRunner for BanditRunner {
    fn name(&self) -> &str {
        RunnerKind::SecurityScanFast.as_str()
    }

    fn is_available(&self) -> bool {
        self.tool.is_available()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, repo_root: &Path) -> CheckResult {
        match self.tool.run(&["-r", ".", "-q", "-ll"], repo_root, self.timeout).await {
            Ok(output) if output.success => {
                CheckResult::passed(PROGRAM, "No high-severity issues")
            }
            Ok(output) => CheckResult::failed(PROGRAM, truncate_detail(&output.stdout)),
            Err(e) => CheckResult::failed(PROGRAM, error_detail("Bandit", &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_decides_verdict() {
        use crate::checks::stub::{recorded_args, StubTool};

        let bin = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();

        let clean = StubTool {
            version: Some("bandit 1.7.8"),
            stdout: "",
            stderr: "",
            exit_code: 0,
        }
        .install(bin.path(), "bandit-clean");
        let result = BanditRunner::default().with_program(clean).run(repo.path()).await;
        assert!(result.passed);
        assert_eq!(result.tool_name, "bandit");
        assert_eq!(result.detail, "No high-severity issues");
        assert_eq!(recorded_args(repo.path()), "-r . -q -ll");

        let report = ">> Issue: [B602:subprocess_popen_with_shell_equals_true]";
        let dirty = StubTool {
            version: Some("bandit 1.7.8"),
            stdout: report,
            stderr: "",
            exit_code: 1,
        }
        .install(bin.path(), "bandit-dirty");
        let result = BanditRunner::default().with_program(dirty).run(repo.path()).await;
        assert!(!result.passed);
        assert_eq!(result.detail.trim_end(), report);
    }
}
