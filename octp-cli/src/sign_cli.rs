//! `octp sign`
//!
//! Reads the working copy, runs the selected checks, then builds, signs and
//! writes the envelope for HEAD.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use octp_core::checks::{CheckResult, Orchestrator};
use octp_core::config::OctpConfig;
use octp_core::envelope::{
    build_envelope, AiTool, Confidence, OptionalContext, ProvenanceDeclaration, ProvenanceMethod,
    ReviewLevel,
};
use octp_core::git::{GitIdentityResolver, GitRepository, IdentityResolver, RepositoryProvider};
use octp_core::integrity::KeyManager;

use crate::display;

#[derive(Args, Debug)]
pub struct SignArgs {
    /// Check profile: full, fast, ci or security (default from .octp.yml)
    #[clap(long, conflicts_with = "runners")]
    profile: Option<String>,

    /// Run exactly these checks instead of a profile (comma-separated)
    #[clap(long, value_delimiter = ',')]
    runners: Option<Vec<String>>,

    /// Where to write the envelope (default from .octp.yml, relative to the repository root)
    #[clap(long, short)]
    output: Option<PathBuf>,

    /// Read the provenance declaration from a YAML or JSON file
    #[clap(long)]
    declaration: Option<PathBuf>,

    /// How the change was produced, e.g. human_only or ai_assisted_human_reviewed
    #[clap(long, required_unless_present = "declaration", conflicts_with = "declaration")]
    method: Option<ProvenanceMethod>,

    /// How much human review the change received, e.g. moderate
    #[clap(long, required_unless_present = "declaration", conflicts_with = "declaration")]
    review_level: Option<ReviewLevel>,

    /// AI tool involved, as model:vendor:version:usage (repeatable)
    #[clap(long = "ai-tool", value_parser = parse_ai_tool, conflicts_with = "declaration")]
    ai_tools: Vec<AiTool>,

    /// Minutes spent reviewing
    #[clap(long, conflicts_with = "declaration")]
    review_minutes: Option<u32>,

    /// Issue or ticket the change addresses
    #[clap(long, conflicts_with = "declaration")]
    issue: Option<String>,

    /// Self-assessed confidence: low, medium or high
    #[clap(long, conflicts_with = "declaration")]
    confidence: Option<Confidence>,

    /// Parts of the change the developer is unsure about
    #[clap(long, conflicts_with = "declaration")]
    uncertainty: Option<String>,

    /// Minutes of prior experience in this codebase
    #[clap(long, conflicts_with = "declaration")]
    codebase_minutes: Option<u32>,

    /// Maximum checks running at once
    #[clap(long)]
    max_workers: Option<usize>,

    /// Key directory (default: $OCTP_KEYS_DIR, config, then ~/.octp/keys)
    #[clap(long)]
    keys_dir: Option<PathBuf>,

    /// Any path inside the repository
    #[clap(long, default_value = ".")]
    repo: PathBuf,
}

/// Parse `model:vendor:version:usage`
fn parse_ai_tool(value: &str) -> Result<AiTool, String> {
    let parts: Vec<&str> = value.splitn(4, ':').map(str::trim).collect();
    match parts.as_slice() {
        [model, vendor, version, usage]
            if [model, vendor, version, usage].iter().all(|p| !p.is_empty()) =>
        {
            Ok(AiTool {
                model: model.to_string(),
                vendor: vendor.to_string(),
                version: version.to_string(),
                usage_type: usage.to_string(),
            })
        }
        _ => Err(format!(
            "Invalid AI tool '{value}'. Expected model:vendor:version:usage"
        )),
    }
}

impl SignArgs {
    pub async fn execute(self) -> Result<()> {
        let repo = GitRepository::new()
            .read(&self.repo)
            .with_context(|| format!("Failed to read repository at {}", self.repo.display()))?;
        info!("Signing {} at {}", repo.repository, repo.commit_hash);

        let mut config = OctpConfig::load(&repo.root).context("Failed to load configuration")?;
        if let Some(profile) = &self.profile {
            config.profile = profile.clone();
        }
        if let Some(max_workers) = self.max_workers {
            config.max_workers = max_workers;
        }

        let declaration = self.declaration()?;

        let keys = KeyManager::new(config.resolve_keys_dir(self.keys_dir.clone()));
        keys.ensure_keypair()
            .with_context(|| format!("Failed to prepare keys in {}", keys.keys_dir().display()))?;

        let developer_id = GitIdentityResolver::new().resolve(&repo.root);
        debug!("Developer identity: {}", developer_id);

        let orchestrator = Orchestrator::from_config(&config)?;
        let results: BTreeMap<String, CheckResult> = match &self.runners {
            Some(names) => orchestrator.run_named(names.as_slice(), &repo.root).await?,
            None => orchestrator.run_profile(&config.profile, &repo.root).await?,
        };
        display::print_check_results(&results);

        let envelope = build_envelope(&repo, &developer_id, &declaration, &results, &keys)
            .context("Failed to build envelope")?;

        let output = match &self.output {
            Some(path) => path.clone(),
            None => repo.root.join(&config.output),
        };
        envelope
            .write_to(&output)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        display::print_envelope_summary(&envelope, &output);
        Ok(())
    }

    fn declaration(&self) -> Result<ProvenanceDeclaration> {
        if let Some(path) = &self.declaration {
            return ProvenanceDeclaration::load(path)
                .with_context(|| format!("Failed to load declaration {}", path.display()));
        }

        let (Some(method), Some(level)) = (self.method, self.review_level) else {
            return Err(anyhow!(
                "Either --declaration or both --method and --review-level are required"
            ));
        };

        let mut declaration = ProvenanceDeclaration::new(method, level);
        if !self.ai_tools.is_empty() {
            declaration.ai_tools = Some(self.ai_tools.clone());
        }
        declaration.human_review_duration_minutes = self.review_minutes;

        let context = OptionalContext {
            issue_reference: self.issue.clone(),
            self_assessed_confidence: self.confidence,
            areas_of_uncertainty: self.uncertainty.clone(),
            time_in_codebase_minutes: self.codebase_minutes,
        };
        if !context.is_empty() {
            declaration.optional_context = Some(context);
        }

        Ok(declaration)
    }
}
