//! Dependency vulnerability audit backed by pip-audit

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::process::{error_detail, truncate_detail, Tool};
use super::{CheckResult, CheckRunner, RunnerKind};

const PROGRAM: &str = "pip-audit";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct PipAuditRunner {
    tool: Tool,
    timeout: Duration,
}

impl PipAuditRunner {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tool: Tool::new(PROGRAM),
            timeout,
        }
    }

    /// Use this executable instead of `pip-audit` from `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.tool = self.tool.with_program(program);
        self
    }
}

impl Default for PipAuditRunner {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl CheckRunner for PipAuditRunner {
    fn name(&self) -> &str {
        RunnerKind::DependencyAudit.as_str()
    }

    fn is_available(&self) -> bool {
        self.tool.is_available()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, repo_root: &Path) -> CheckResult {
        let args = ["--progress-spinner=off"];
        match self.tool.run(&args, repo_root, self.timeout).await {
            Ok(output) if output.success => {
                CheckResult::passed(PROGRAM, "No known vulnerabilities")
            }
            Ok(output) => CheckResult::failed(PROGRAM, truncate_detail(&output.stdout)),
            Err(e) => CheckResult::failed(PROGRAM, error_detail(PROGRAM, &e)),
        }
    }
}
