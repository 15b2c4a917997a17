//! Secret scan backed by detect-secrets
//!
//! `detect-secrets scan` exits zero even when it finds something, so the
//! verdict comes from the JSON report: any entry under `results` fails.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::process::{error_detail, Tool, ToolOutput};
use super::{CheckResult, CheckRunner, RunnerKind};

const PROGRAM: &str = "detect-secrets";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct ScanReport {
    #[serde(default)]
    results: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct DetectSecretsRunner {
    tool: Tool,
    timeout: Duration,
}

impl DetectSecretsRunner {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tool: Tool::new(PROGRAM),
            timeout,
        }
    }

    /// Use this executable instead of `detect-secrets` from `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.tool = self.tool.with_program(program);
        self
    }
}

impl Default for DetectSecretsRunner {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

/// Turn scanner output into a verdict and detail
fn interpret(output: &ToolOutput) -> CheckResult {
    match serde_json::from_str::<ScanReport>(&output.stdout) {
        Ok(report) if report.results.is_empty() => {
            CheckResult::passed(PROGRAM, "No secrets detected")
        }
        Ok(report) => CheckResult::failed(
            PROGRAM,
            format!("Secrets found: {}", report.results.len()),
        ),
        Err(_) if output.success => CheckResult::passed(PROGRAM, "Scan completed"),
        Err(_) => CheckResult::failed(PROGRAM, "Potential secrets detected"),
    }
}

#[async_trait]
impl CheckRunner for DetectSecretsRunner {
    fn name(&self) -> &str {
        RunnerKind::SecretScan.as_str()
    }

    fn is_available(&self) -> bool {
        self.tool.is_available()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, repo_root: &Path) -> CheckResult {
        match self.tool.run(&["scan", "."], repo_root, self.timeout).await {
            Ok(output) => interpret(&output),
            Err(e) => CheckResult::failed(PROGRAM, error_detail(PROGRAM, &e)),
        }
    }
}
