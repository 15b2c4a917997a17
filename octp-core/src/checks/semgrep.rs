//! Deep static security scan backed by semgrep's auto ruleset

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::process::{error_detail, truncate_detail, Tool};
use super::{CheckResult, CheckRunner, RunnerKind};

const PROGRAM: &str = "semgrep";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct SemgrepRunner {
    tool: Tool,
    timeout: Duration,
}

impl SemgrepRunner {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tool: Tool::new(PROGRAM),
            timeout,
        }
    }

    /// Use this executable instead of `semgrep` from `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.tool = self.tool.with_program(program);
        self
    }
}

impl Default for SemgrepRunner {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl CheckRunner for SemgrepRunner {
    fn name(&self) -> &str {
        RunnerKind::SecurityScanDeep.as_str()
    }

    fn is_available(&self) -> bool {
        self.tool.is_available()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, repo_root: &Path) -> CheckResult {
        let args = ["--config=auto", "--quiet", "--error", "."];
        let (outcome, version) = self.tool.run_versioned(&args, repo_root, self.timeout).await;

        // semgrep prints the bare version number
        let tool_name = self.tool.versioned_name(version.as_deref());

        match outcome {
            Ok(output) if output.success => CheckResult::passed(tool_name, "No issues found"),
            Ok(output) => CheckResult::failed(
                tool_name,
                format!("Issues found: {}", truncate_detail(&output.stderr)),
            ),
            Err(e) => CheckResult::failed(tool_name, error_detail("Semgrep", &e)),
        }
    }
}
