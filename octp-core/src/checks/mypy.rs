//! Type check backed by mypy over `src/`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::process::{error_detail, second_token, truncate_detail, Tool};
use super::{CheckResult, CheckRunner, RunnerKind};

const PROGRAM: &str = "mypy";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct MypyRunner {
    tool: Tool,
    timeout: Duration,
}

impl MypyRunner {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tool: Tool::new(PROGRAM),
            timeout,
        }
    }

    /// Use this executable instead of `mypy` from `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.tool = self.tool.with_program(program);
        self
    }
}

impl Default for MypyRunner {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl CheckRunner for MypyRunner {
    fn name(&self) -> &str {
        RunnerKind::TypeCheck.as_str()
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
            .run_versioned(&["src/"], repo_root, self.timeout)
            .await;
        let tool_name = self.tool.versioned_name(version.as_deref().and_then(second_token));

        match outcome {
            Ok(output) if output.success => CheckResult::passed(tool_name, "No type errors"),
            Ok(output) => CheckResult::failed(tool_name, truncate_detail(&output.stdout)),
            Err(e) => CheckResult::failed(tool_name, error_detail("MyPy", &e)),
        }
    }
}
