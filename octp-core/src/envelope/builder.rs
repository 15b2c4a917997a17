//! Assembly and signing of trust envelopes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use super::model::{
    envelope_now, AiTool, AnalysisResult, Envelope, Integrity, OptionalContext, Provenance,
    ProvenanceMethod, ReviewLevel, Verification, OCTP_VERSION,
};
use crate::checks::{CheckResult, RunnerKind};
use crate::error::{OctpError, Result};
use crate::git::RepoInfo;
use crate::integrity::{KeyManager, SIGNATURE_ALGORITHM};

/// What the developer declares about how the change was made
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceDeclaration {
    pub method: ProvenanceMethod,
    #[serde(default)]
    pub ai_tools: Option<Vec<AiTool>>,
    #[serde(alias = "review_level")]
    pub human_review_level: ReviewLevel,
    #[serde(default, alias = "review_minutes")]
    pub human_review_duration_minutes: Option<u32>,
    #[serde(default)]
    pub optional_context: Option<OptionalContext>,
}

impl ProvenanceDeclaration {
    pub fn new(method: ProvenanceMethod, human_review_level: ReviewLevel) -> Self {
        Self {
            method,
            ai_tools: None,
            human_review_level,
            human_review_duration_minutes: None,
            optional_context: None,
        }
    }

    /// Read a declaration from a YAML or JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| OctpError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // JSON is a subset of YAML, so one parser covers both
        serde_yaml_ng::from_str(&content).map_err(|source| OctpError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn analysis_of(result: Option<&CheckResult>) -> AnalysisResult {
    match result {
        Some(r) if r.passed => AnalysisResult::Passed,
        Some(_) => AnalysisResult::Failed,
        None => AnalysisResult::Skipped,
    }
}

impl Verification {
    /// Summarize check results by well-known runner identity. A check that
    /// did not run is `skipped`, never `failed`.
    pub fn from_check_results(results: &BTreeMap<String, CheckResult>) -> Self {
        let get = |kind: RunnerKind| results.get(kind.as_str());

        let tests = get(RunnerKind::Test);
        let static_analysis =
            get(RunnerKind::SecurityScanDeep).or_else(|| get(RunnerKind::SecurityScanFast));
        let dependencies = get(RunnerKind::DependencyAudit);

        Verification {
            tests_passed: tests.is_some_and(|r| r.passed),
            test_suite_hash: tests.and_then(|r| r.suite_hash.clone()),
            static_analysis: analysis_of(static_analysis),
            static_analysis_tool: static_analysis.map(|r| r.tool_name.clone()),
            dependency_check: analysis_of(dependencies),
            novel_dependencies_introduced: false,
        }
    }
}

/// Build the unsigned envelope. Declaration fields are copied as given.
pub fn assemble(
    repo: &RepoInfo,
    developer_id: &str,
    declaration: &ProvenanceDeclaration,
    check_results: &BTreeMap<String, CheckResult>,
) -> Envelope {
    let provenance = Provenance {
        method: declaration.method,
        ai_tools: declaration.ai_tools.clone(),
        human_review_level: declaration.human_review_level,
        human_review_duration_minutes: declaration.human_review_duration_minutes,
        developer_id: developer_id.to_string(),
    };

    Envelope {
        octp_version: OCTP_VERSION.to_string(),
        contribution_id: Uuid::new_v4().to_string(),
        timestamp: envelope_now(),
        repository: repo.repository.clone(),
        commit_hash: repo.commit_hash.clone(),
        provenance,
        verification: Verification::from_check_results(check_results),
        integrity: None,
        optional_context: declaration.optional_context.clone(),
    }
}

/// Hash the envelope's signable content, sign the digest and attach the
/// integrity section
pub fn sign(mut envelope: Envelope, keys: &KeyManager) -> Result<Envelope> {
    if envelope.is_signed() {
        return Err(OctpError::AlreadySigned);
    }

    let payload_hash = envelope.payload_hash()?;
    debug!("Payload hash {}", payload_hash);

    let developer_signature = keys.sign(&payload_hash)?;

    envelope.attach_integrity(Integrity {
        payload_hash,
        developer_signature,
        signature_algorithm: SIGNATURE_ALGORITHM.to_string(),
        signed_at: envelope_now(),
    })?;

    info!(
        "Signed envelope {} for commit {}",
        envelope.contribution_id, envelope.commit_hash
    );
    Ok(envelope)
}

/// Assemble and sign in one step
pub fn build_envelope(
    repo: &RepoInfo,
    developer_id: &str,
    declaration: &ProvenanceDeclaration,
    check_results: &BTreeMap<String, CheckResult>,
    keys: &KeyManager,
) -> Result<Envelope> {
    sign(assemble(repo, developer_id, declaration, check_results), keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::keys;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn repo() -> RepoInfo {
        RepoInfo {
            commit_hash: "0123456789abcdef0123456789abcdef01234567".to_string(),
            repository: "github.com/acme/widgets".to_string(),
            branch: "main".to_string(),
            root: PathBuf::from("/work/widgets"),
        }
    }

    fn results(entries: &[(&str, CheckResult)]) -> BTreeMap<String, CheckResult> {
        entries
            .iter()
            .map(|(name, result)| (name.to_string(), result.clone()))
            .collect()
    }

    #[test]
    fn test_absent_checks_are_skipped() {
        let verification = Verification::from_check_results(&BTreeMap::new());

        assert!(!verification.tests_passed);
        assert_eq!(verification.test_suite_hash, None);
        assert_eq!(verification.static_analysis, AnalysisResult::Skipped);
        assert_eq!(verification.static_analysis_tool, None);
        assert_eq!(verification.dependency_check, AnalysisResult::Skipped);
        assert!(!verification.novel_dependencies_introduced);
    }

    #[test]
    fn test_deep_scan_preferred_over_fast() {
        let checks = results(&[
            ("security-scan-fast", CheckResult::passed("bandit", "clean")),
            (
                "security-scan-deep",
                CheckResult::failed("semgrep@1.50.0", "Issues found: 2"),
            ),
        ]);

        let verification = Verification::from_check_results(&checks);
        assert_eq!(verification.static_analysis, AnalysisResult::Failed);
        assert_eq!(
            verification.static_analysis_tool.as_deref(),
            Some("semgrep@1.50.0")
        );
    }

    #[test]
    fn test_fast_scan_used_when_deep_absent() {
        let checks = results(&[
            ("security-scan-fast", CheckResult::passed("bandit", "clean")),
            ("dependency-audit", CheckResult::failed("pip-audit", "1 vuln")),
        ]);

        let verification = Verification::from_check_results(&checks);
        assert_eq!(verification.static_analysis, AnalysisResult::Passed);
        assert_eq!(verification.static_analysis_tool.as_deref(), Some("bandit"));
        assert_eq!(verification.dependency_check, AnalysisResult::Failed);
    }

    #[test]
    fn test_test_results_carry_suite_hash() {
        let checks = results(&[(
            "test",
            CheckResult::passed("pytest@8.1.1", "3 passed")
                .with_suite_hash(Some("ab".repeat(16))),
        )]);

        let verification = Verification::from_check_results(&checks);
        assert!(verification.tests_passed);
        assert_eq!(verification.test_suite_hash, Some("ab".repeat(16)));
    }

    #[test]
    fn test_declaration_copied_verbatim() {
        // human_only with AI tools is accepted as declared
        let mut declaration =
            ProvenanceDeclaration::new(ProvenanceMethod::HumanOnly, ReviewLevel::Glance);
        declaration.ai_tools = Some(vec![AiTool {
            model: "model-x".to_string(),
            vendor: "vendor-y".to_string(),
            version: "1".to_string(),
            usage_type: "completion".to_string(),
        }]);
        declaration.human_review_duration_minutes = Some(12);

        let envelope = assemble(&repo(), "github:octocat", &declaration, &BTreeMap::new());

        assert_eq!(envelope.provenance.method, ProvenanceMethod::HumanOnly);
        assert_eq!(envelope.provenance.ai_tools, declaration.ai_tools);
        assert_eq!(envelope.provenance.human_review_duration_minutes, Some(12));
        assert_eq!(envelope.provenance.developer_id, "github:octocat");
        assert_eq!(envelope.repository, "github.com/acme/widgets");
        assert_eq!(envelope.octp_version, "0.1");
        assert!(Uuid::parse_str(&envelope.contribution_id).is_ok());
        assert!(!envelope.is_signed());
    }

    #[test]
    fn test_build_envelope_signs_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let keys = KeyManager::new(tmp.path());
        let declaration =
            ProvenanceDeclaration::new(ProvenanceMethod::HumanOnly, ReviewLevel::Moderate);
        let checks = results(&[("test", CheckResult::passed("pytest@8.1.1", "1 passed"))]);

        let envelope =
            build_envelope(&repo(), "email:dev@example.com", &declaration, &checks, &keys).unwrap();

        assert!(envelope.verification.tests_passed);
        assert_eq!(envelope.verification.static_analysis, AnalysisResult::Skipped);

        let integrity = envelope.integrity.as_ref().unwrap();
        assert_eq!(integrity.payload_hash.len(), 64);
        assert_eq!(integrity.signature_algorithm, "ES256");
        assert_eq!(integrity.payload_hash, envelope.payload_hash().unwrap());

        let public = keys.public_key_pem().unwrap();
        assert!(keys::verify(
            &integrity.payload_hash,
            &integrity.developer_signature,
            &public
        ));
    }

    #[test]
    fn test_signing_twice_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let keys = KeyManager::new(tmp.path());
        let declaration =
            ProvenanceDeclaration::new(ProvenanceMethod::HumanOnly, ReviewLevel::None);

        let signed =
            build_envelope(&repo(), "unknown", &declaration, &BTreeMap::new(), &keys).unwrap();
        assert!(matches!(sign(signed, &keys), Err(OctpError::AlreadySigned)));
    }

    #[test]
    fn test_load_declaration_yaml_and_json() {
        let tmp = tempfile::tempdir().unwrap();

        let yaml_path = tmp.path().join("declaration.yml");
        std::fs::write(
            &yaml_path,
            r##"
method: ai_assisted_human_reviewed
ai_tools:
  - model: model-x
    vendor: vendor-y
    version: "2"
    usage_type: code_generation
human_review_level: substantial_modification
human_review_duration_minutes: 25
optional_context:
  issue_reference: "#42"
  self_assessed_confidence: high
"##,
        )
        .unwrap();

        let declaration = ProvenanceDeclaration::load(&yaml_path).unwrap();
        assert_eq!(declaration.method, ProvenanceMethod::AiAssistedHumanReviewed);
        assert_eq!(declaration.human_review_level, ReviewLevel::Substantial);
        assert_eq!(declaration.ai_tools.as_ref().unwrap().len(), 1);
        let context = declaration.optional_context.unwrap();
        assert_eq!(context.issue_reference.as_deref(), Some("#42"));

        let json_path = tmp.path().join("declaration.json");
        std::fs::write(
            &json_path,
            r#"{"method": "human_only", "review_level": "glance"}"#,
        )
        .unwrap();

        let declaration = ProvenanceDeclaration::load(&json_path).unwrap();
        assert_eq!(declaration.method, ProvenanceMethod::HumanOnly);
        assert_eq!(declaration.human_review_level, ReviewLevel::Glance);
        assert_eq!(declaration.optional_context, None);
    }
}
