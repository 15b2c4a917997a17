//! Bounded execution of external tools

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Longest tool output carried into a result detail
pub const DETAIL_LIMIT: usize = 200;

/// Time allowed for `<tool> --version`
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a tool invocation produced no output
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {} seconds", timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    #[error("failed to collect output of {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured result of a finished tool
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// An external tool: the name it reports under and the executable to launch
#[derive(Debug, Clone)]
pub struct Tool {
    name: &'static str,
    program: PathBuf,
}

impl Tool {
    /// Tool launched by name from `PATH`
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            program: PathBuf::from(name),
        }
    }

    /// Launch a specific executable instead, e.g. one inside a virtualenv
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_available(&self) -> bool {
        on_path(&self.program)
    }

    pub async fn run(
        &self,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ToolOutput, ToolError> {
        run_tool(&self.program, args, cwd, timeout).await
    }

    /// Run the tool and ask for its version side by side, both within
    /// `timeout`, so the pair never outlasts the tool's own bound
    pub async fn run_versioned(
        &self,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> (Result<ToolOutput, ToolError>, Option<String>) {
        let version_timeout = VERSION_TIMEOUT.min(timeout);
        tokio::join!(
            run_tool(&self.program, args, cwd, timeout),
            version_output(&self.program, cwd, version_timeout)
        )
    }

    /// `name@version`, with `unknown` when the tool gave no version
    pub fn versioned_name(&self, version: Option<&str>) -> String {
        format!("{}@{}", self.name, version.unwrap_or("unknown"))
    }
}

/// Run `program args...` in `cwd`, killing it if it outlives `timeout`
pub async fn run_tool(
    program: &Path,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
) -> Result<ToolOutput, ToolError> {
    let label = program.display().to_string();
    debug!("Running {} {} in {}", label, args.join(" "), cwd.display());

    let child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: label.clone(),
            source,
        })?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| ToolError::TimedOut {
            program: label.clone(),
            timeout,
        })?
        .map_err(|source| ToolError::Wait {
            program: label.clone(),
            source,
        })?;

    let exit_code = output.status.code();
    debug!("{} exited with {:?}", label, exit_code);

    Ok(ToolOutput {
        success: output.status.success(),
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Trimmed stdout of `<program> --version`, if the tool answers in time
pub async fn version_output(program: &Path, cwd: &Path, timeout: Duration) -> Option<String> {
    let output = run_tool(program, &["--version"], cwd, timeout).await.ok()?;
    let text = output.stdout.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Second whitespace token of `--version` output, e.g. `8.1.1` from
/// `pytest 8.1.1`
pub fn second_token(text: &str) -> Option<&str> {
    text.split_whitespace().nth(1)
}

/// Whether `program` resolves on `PATH` (or is an executable path)
pub fn on_path(program: &Path) -> bool {
    which::which(program).is_ok()
}

/// Detail for a tool that never produced output
pub fn error_detail(label: &str, error: &ToolError) -> String {
    match error {
        ToolError::TimedOut { timeout, .. } => {
            format!("{label} timed out after {} seconds", timeout.as_secs())
        }
        other => format!("Runner error: {other}"),
    }
}

/// First [`DETAIL_LIMIT`] characters of `text`
pub fn truncate_detail(text: &str) -> String {
    text.chars().take(DETAIL_LIMIT).collect()
}
