//! Shared helpers for octp-core integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use octp_core::checks::{CheckResult, CheckRunner};
use octp_core::envelope::{ProvenanceDeclaration, ProvenanceMethod, ReviewLevel};
use octp_core::git::RepoInfo;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

pub fn sample_repo() -> RepoInfo {
    RepoInfo {
        commit_hash: "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3".to_string(),
        repository: "github.com/acme/widgets".to_string(),
        branch: "main".to_string(),
        root: PathBuf::from("/work/widgets"),
    }
}

pub fn human_moderate() -> ProvenanceDeclaration {
    ProvenanceDeclaration::new(ProvenanceMethod::HumanOnly, ReviewLevel::Moderate)
}

/// How a [`ScriptedRunner`] behaves when run
#[derive(Debug, Clone)]
pub enum Script {
    Pass(&'static str),
    Fail(&'static str),
    Panic(&'static str),
    Sleep(Duration),
}

/// Runner with scripted behavior, standing in for an external tool
pub struct ScriptedRunner {
    pub name: String,
    pub available: bool,
    pub timeout: Duration,
    pub script: Script,
}

impl ScriptedRunner {
    pub fn new(name: &str, script: Script) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            timeout: Duration::from_secs(30),
            script,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CheckRunner for ScriptedRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, _repo_root: &Path) -> CheckResult {
        match &self.script {
            Script::Pass(detail) => CheckResult::passed(format!("{}@1.0", self.name), *detail),
            Script::Fail(detail) => CheckResult::failed(format!("{}@1.0", self.name), *detail),
            Script::Panic(message) => panic!("{}", message),
            Script::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                CheckResult::passed(&self.name, "finished")
            }
        }
    }
}
