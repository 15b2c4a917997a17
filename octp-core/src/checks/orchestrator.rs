//! Profile resolution and concurrent execution of check runners
//!
//! Every selected runner gets its own spawned task, bounded by a semaphore
//! and wrapped in a timeout. A runner that panics or hangs is recorded as a
//! failed result; the rest of the batch is unaffected.

use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, error, info, instrument, warn};

use super::{CheckResult, CheckRunner, RunnerKind};
use crate::config::OctpConfig;
use crate::error::{OctpError, Result};

pub const DEFAULT_PROFILE: &str = "full";
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Slack on top of a runner's own timeout before the orchestrator gives up
const DEFAULT_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Named, fixed sets of runners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    Full,
    Fast,
    Ci,
    Security,
}

impl Profile {
    pub const ALL: [Profile; 4] = [Profile::Full, Profile::Fast, Profile::Ci, Profile::Security];

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Full => "full",
            Profile::Fast => "fast",
            Profile::Ci => "ci",
            Profile::Security => "security",
        }
    }

    pub fn kinds(&self) -> &'static [RunnerKind] {
        match self {
            Profile::Full => &RunnerKind::ALL,
            Profile::Fast => &[
                RunnerKind::Lint,
                RunnerKind::SecurityScanFast,
                RunnerKind::SecretScan,
            ],
            Profile::Ci => &[
                RunnerKind::Test,
                RunnerKind::Lint,
                RunnerKind::SecurityScanFast,
                RunnerKind::DependencyAudit,
                RunnerKind::SecretScan,
            ],
            Profile::Security => &[
                RunnerKind::SecurityScanFast,
                RunnerKind::DependencyAudit,
                RunnerKind::SecretScan,
                RunnerKind::SecurityScanDeep,
            ],
        }
    }

    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|p| p.as_str().to_string()).collect()
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = OctpError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| OctpError::UnknownProfile {
                name: s.to_string(),
                choices: Self::names(),
            })
    }
}

/// Runner identities for a profile name
pub fn resolve(profile_name: &str) -> Result<Vec<RunnerKind>> {
    let profile: Profile = profile_name.parse()?;
    Ok(profile.kinds().to_vec())
}

/// Runner identities for explicit names, in `full` profile order
pub fn resolve_names<S: AsRef<str>>(names: &[S]) -> Result<Vec<RunnerKind>> {
    let requested = names
        .iter()
        .map(|name| name.as_ref().parse::<RunnerKind>())
        .collect::<Result<BTreeSet<_>>>()?;

    Ok(RunnerKind::ALL
        .into_iter()
        .filter(|kind| requested.contains(kind))
        .collect())
}

/// Drop runners whose tool is not installed
pub fn filter_available(runners: Vec<Arc<dyn CheckRunner>>) -> Vec<Arc<dyn CheckRunner>> {
    runners
        .into_iter()
        .filter(|runner| {
            let available = runner.is_available();
            if !available {
                info!("Skipping {}: tool not found on PATH", runner.name());
            }
            available
        })
        .collect()
}

/// Registry of runners plus the execution policy
pub struct Orchestrator {
    runners: Vec<Arc<dyn CheckRunner>>,
    max_workers: usize,
    timeout_grace: Duration,
}

impl Orchestrator {
    /// An orchestrator with no runners registered
    pub fn new() -> Self {
        Self {
            runners: Vec::new(),
            max_workers: DEFAULT_MAX_WORKERS,
            timeout_grace: DEFAULT_TIMEOUT_GRACE,
        }
    }

    /// Built-in runners shaped by the config file: disabled runners are left
    /// out and timeouts overridden.
    pub fn from_config(config: &OctpConfig) -> Result<Self> {
        config.validate()?;

        let mut orchestrator = Self::new().with_max_workers(config.max_workers);
        for kind in RunnerKind::ALL {
            let settings = config.runner_settings(kind);
            if settings.is_some_and(|s| !s.enabled) {
                debug!("Runner {} disabled in configuration", kind);
                continue;
            }

            let runner = match settings.and_then(|s| s.timeout_seconds) {
                Some(secs) => kind.runner_with_timeout(Duration::from_secs(secs)),
                None => kind.default_runner(),
            };
            orchestrator.register(Arc::from(runner))?;
        }

        Ok(orchestrator)
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_timeout_grace(mut self, grace: Duration) -> Self {
        self.timeout_grace = grace;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Add a runner. Identities must be non-empty and unique.
    pub fn register(&mut self, runner: Arc<dyn CheckRunner>) -> Result<()> {
        let name = runner.name();
        if name.trim().is_empty() {
            return Err(OctpError::Configuration(
                "check runner registered without a name".to_string(),
            ));
        }
        if self.runners.iter().any(|r| r.name() == name) {
            return Err(OctpError::Configuration(format!(
                "check runner '{name}' registered twice"
            )));
        }

        self.runners.push(runner);
        Ok(())
    }

    pub fn registered_names(&self) -> Vec<&str> {
        self.runners.iter().map(|r| r.name()).collect()
    }

    /// Registered runners for the given identities, in the given order
    pub fn select(&self, kinds: &[RunnerKind]) -> Vec<Arc<dyn CheckRunner>> {
        kinds
            .iter()
            .filter_map(|kind| {
                let found = self.runners.iter().find(|r| r.name() == kind.as_str());
                if found.is_none() {
                    debug!("Runner {} not registered, skipping", kind);
                }
                found.cloned()
            })
            .collect()
    }

    /// Run the available runners of a profile
    pub async fn run_profile(
        &self,
        profile_name: &str,
        repo_root: &Path,
    ) -> Result<BTreeMap<String, CheckResult>> {
        let kinds = resolve(profile_name)?;
        let runners = filter_available(self.select(&kinds));
        Ok(self.execute(runners, repo_root).await)
    }

    /// Run the available runners among explicitly named ones
    pub async fn run_named<S: AsRef<str>>(
        &self,
        names: &[S],
        repo_root: &Path,
    ) -> Result<BTreeMap<String, CheckResult>> {
        let kinds = resolve_names(names)?;
        let runners = filter_available(self.select(&kinds));
        Ok(self.execute(runners, repo_root).await)
    }

    /// Run runners concurrently and collect exactly one result per runner
    #[instrument(skip_all, fields(runners = runners.len(), workers = self.max_workers))]
    pub async fn execute(
        &self,
        runners: Vec<Arc<dyn CheckRunner>>,
        repo_root: &Path,
    ) -> BTreeMap<String, CheckResult> {
        if runners.is_empty() {
            info!("No check runners to execute");
            return BTreeMap::new();
        }

        info!(
            "Running {} checks with up to {} in parallel",
            runners.len(),
            self.max_workers
        );

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let root = repo_root.to_path_buf();
        let grace = self.timeout_grace;

        let tasks = runners.into_iter().map(|runner| {
            let name = runner.name().to_string();
            let semaphore = Arc::clone(&semaphore);
            let root = root.clone();

            let handle = tokio::spawn(async move {
                // Queueing time does not count against the runner's bound
                let _permit = semaphore.acquire_owned().await.ok();
                let bound = runner.timeout().saturating_add(grace);

                match tokio::time::timeout(bound, runner.run(&root)).await {
                    Ok(result) => result,
                    Err(_) => CheckResult::timed_out(runner.name(), bound),
                }
            });

            async move { (name, handle.await) }
        });

        let mut results = BTreeMap::new();
        for (name, joined) in join_all(tasks).await {
            let result = match joined {
                Ok(result) => result,
                Err(join_error) => {
                    let reason = panic_reason(join_error);
                    error!("Runner {} crashed: {}", name, reason);
                    CheckResult::crashed(&name, &reason)
                }
            };

            if result.passed {
                debug!("{} passed: {}", name, result.detail);
            } else {
                warn!("{} failed: {}", name, result.detail);
            }
            results.insert(name, result);
        }

        let passed = results.values().filter(|r| r.passed).count();
        info!("Checks complete: {}/{} passed", passed, results.len());

        results
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_reason(join_error: JoinError) -> String {
    if !join_error.is_panic() {
        return "task was cancelled".to_string();
    }

    let payload = join_error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
