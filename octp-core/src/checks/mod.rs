//! Verification check runners
//!
//! Each runner wraps one external tool and normalizes its outcome into a
//! [`CheckResult`]. Runners never return errors: anything that goes wrong
//! inside a run (missing binary, timeout, unreadable output) becomes a failed
//! result with a human-readable detail.

pub mod bandit;
pub mod detect_secrets;
pub mod mypy;
pub mod orchestrator;
pub mod pip_audit;
pub mod process;
pub mod pytest;
pub mod ruff;
pub mod semgrep;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{OctpError, Result};

pub use bandit::BanditRunner;
pub use detect_secrets::DetectSecretsRunner;
pub use mypy::MypyRunner;
pub use orchestrator::{Orchestrator, Profile, DEFAULT_MAX_WORKERS, DEFAULT_PROFILE};
pub use pip_audit::PipAuditRunner;
pub use pytest::PytestRunner;
pub use ruff::RuffRunner;
pub use semgrep::SemgrepRunner;

/// Outcome of a single runner invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub passed: bool,
    /// Tool identity, `name@version` when the tool reports one
    pub tool_name: String,
    pub suite_hash: Option<String>,
    pub detail: String,
}

impl CheckResult {
    pub fn passed(tool_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            tool_name: tool_name.into(),
            suite_hash: None,
            detail: detail.into(),
        }
    }

    pub fn failed(tool_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            tool_name: tool_name.into(),
            suite_hash: None,
            detail: detail.into(),
        }
    }

    pub fn with_suite_hash(mut self, suite_hash: Option<String>) -> Self {
        self.suite_hash = suite_hash;
        self
    }

    /// Turn a runner-level failure into data
    pub fn from_runner_error(error: &OctpError) -> Self {
        let runner = match error {
            OctpError::RunnerTimeout { runner, .. } | OctpError::RunnerCrash { runner, .. } => {
                runner.as_str()
            }
            _ => "unknown",
        };
        Self::failed(runner, error.to_string())
    }

    /// Result recorded for a runner that panicked
    pub fn crashed(runner_name: &str, reason: &str) -> Self {
        Self::from_runner_error(&OctpError::RunnerCrash {
            runner: runner_name.to_string(),
            reason: reason.to_string(),
        })
    }

    /// Result recorded for a runner that outlived its time bound
    pub fn timed_out(runner_name: &str, bound: Duration) -> Self {
        Self::from_runner_error(&OctpError::RunnerTimeout {
            runner: runner_name.to_string(),
            seconds: bound.as_secs(),
        })
    }
}

/// A named, independently available verification check
#[async_trait]
pub trait CheckRunner: Send + Sync {
    /// Stable identity; also the key under which the result is reported
    fn name(&self) -> &str;

    /// Whether the underlying tool can be used here. Cheap, no side effects.
    fn is_available(&self) -> bool;

    /// Upper bound on a single run
    fn timeout(&self) -> Duration;

    /// Run the check. Always produces exactly one result.
    async fn run(&self, repo_root: &Path) -> CheckResult;
}

/// The seven built-in runner identities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RunnerKind {
    Test,
    Lint,
    TypeCheck,
    SecurityScanFast,
    DependencyAudit,
    SecretScan,
    SecurityScanDeep,
}

impl RunnerKind {
    /// Every built-in runner, in the order of the `full` profile
    pub const ALL: [RunnerKind; 7] = [
        RunnerKind::Test,
        RunnerKind::Lint,
        RunnerKind::TypeCheck,
        RunnerKind::SecurityScanDeep,
        RunnerKind::SecurityScanFast,
        RunnerKind::DependencyAudit,
        RunnerKind::SecretScan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerKind::Test => "test",
            RunnerKind::Lint => "lint",
            RunnerKind::TypeCheck => "type-check",
            RunnerKind::SecurityScanFast => "security-scan-fast",
            RunnerKind::DependencyAudit => "dependency-audit",
            RunnerKind::SecretScan => "secret-scan",
            RunnerKind::SecurityScanDeep => "security-scan-deep",
        }
    }

    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|k| k.as_str().to_string()).collect()
    }

    /// Build the default runner for this identity
    pub fn default_runner(&self) -> Box<dyn CheckRunner> {
        match self {
            RunnerKind::Test => Box::new(PytestRunner::default()),
            RunnerKind::Lint => Box::new(RuffRunner::default()),
            RunnerKind::TypeCheck => Box::new(MypyRunner::default()),
            RunnerKind::SecurityScanFast => Box::new(BanditRunner::default()),
            RunnerKind::DependencyAudit => Box::new(PipAuditRunner::default()),
            RunnerKind::SecretScan => Box::new(DetectSecretsRunner::default()),
            RunnerKind::SecurityScanDeep => Box::new(SemgrepRunner::default()),
        }
    }

    /// Build the runner with an overridden timeout
    pub fn runner_with_timeout(&self, timeout: Duration) -> Box<dyn CheckRunner> {
        match self {
            RunnerKind::Test => Box::new(PytestRunner::with_timeout(timeout)),
            RunnerKind::Lint => Box::new(RuffRunner::with_timeout(timeout)),
            RunnerKind::TypeCheck => Box::new(MypyRunner::with_timeout(timeout)),
            RunnerKind::SecurityScanFast => Box::new(BanditRunner::with_timeout(timeout)),
            RunnerKind::DependencyAudit => Box::new(PipAuditRunner::with_timeout(timeout)),
            RunnerKind::SecretScan => Box::new(DetectSecretsRunner::with_timeout(timeout)),
            RunnerKind::SecurityScanDeep => Box::new(SemgrepRunner::with_timeout(timeout)),
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunnerKind {
    type Err = OctpError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| OctpError::UnknownRunner {
                name: name.to_string(),
                choices: Self::names(),
            })
    }
}

/// Stand-in executables for exercising runners without the real tools
#[cfg(all(test, unix))]
pub(crate) mod stub {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Name of the file a stub writes its arguments to, in its working dir
    pub const ARGS_FILE: &str = ".stub-args";

    /// Scripted behaviour of a fake tool
    pub struct StubTool<'a> {
        pub version: Option<&'a str>,
        pub stdout: &'a str,
        pub stderr: &'a str,
        pub exit_code: i32,
    }

    impl StubTool<'_> {
        /// Write the script as `dir/name` and return its path
        pub fn install(&self, dir: &Path, name: &str) -> PathBuf {
            let version = match self.version {
                Some(line) => format!("  printf '%s\\n' '{line}'\n  exit 0"),
                None => "  exit 1".to_string(),
            };
            let script = format!(
                "#!/bin/sh\n\
                 if [ \"$1\" = \"--version\" ]; then\n{version}\nfi\n\
                 echo \"$@\" > {ARGS_FILE}\n\
                 cat <<'STDOUT'\n{stdout}\nSTDOUT\n\
                 cat >&2 <<'STDERR'\n{stderr}\nSTDERR\n\
                 exit {code}\n",
                stdout = self.stdout,
                stderr = self.stderr,
                code = self.exit_code,
            );

            let path = dir.join(name);
            fs::write(&path, script).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }
    }

    /// Arguments the last stub invocation in `cwd` received
    pub fn recorded_args(cwd: &Path) -> String {
        fs::read_to_string(cwd.join(ARGS_FILE))
            .unwrap()
            .trim()
            .to_string()
    }
}
