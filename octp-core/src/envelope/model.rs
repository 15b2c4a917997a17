//! Trust envelope data model
//!
//! Field names and string values are the OCTP 0.1 wire format. Optional
//! fields inside provenance and verification serialize as `null` rather than
//! being omitted so every implementation hashes the same document.

use chrono::{DateTime, SubsecRound, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{OctpError, Result};
use crate::integrity::{hash_value, to_canonical_value};

/// Current time at the precision envelopes carry (microseconds)
pub fn envelope_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Timestamps on the wire: RFC 3339 in UTC with a `Z` suffix, whole seconds
/// when the microsecond part is zero, otherwise exactly six fraction digits.
/// Other implementations re-serialize this way before hashing.
mod wire_time {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn format(at: &DateTime<Utc>) -> String {
        let seconds = at.format("%Y-%m-%dT%H:%M:%S");
        // Leap-second nanos (>= 1e9) fold into the last microsecond
        let micros = (at.nanosecond() / 1_000).min(999_999);
        if micros == 0 {
            format!("{seconds}Z")
        } else {
            format!("{seconds}.{micros:06}Z")
        }
    }

    pub fn serialize<S: Serializer>(
        at: &DateTime<Utc>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<DateTime<Utc>, D::Error> {
        DateTime::<Utc>::deserialize(deserializer)
    }
}

/// Protocol version written into every envelope
pub const OCTP_VERSION: &str = "0.1";

/// How a contribution was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceMethod {
    HumanOnly,
    AiAssistedHumanReviewed,
    AiGeneratedHumanReviewed,
    AiGeneratedUnreviewed,
}

impl ProvenanceMethod {
    pub const ALL: [ProvenanceMethod; 4] = [
        ProvenanceMethod::HumanOnly,
        ProvenanceMethod::AiAssistedHumanReviewed,
        ProvenanceMethod::AiGeneratedHumanReviewed,
        ProvenanceMethod::AiGeneratedUnreviewed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProvenanceMethod::HumanOnly => "human_only",
            ProvenanceMethod::AiAssistedHumanReviewed => "ai_assisted_human_reviewed",
            ProvenanceMethod::AiGeneratedHumanReviewed => "ai_generated_human_reviewed",
            ProvenanceMethod::AiGeneratedUnreviewed => "ai_generated_unreviewed",
        }
    }

    /// Human-readable label for display
    pub fn label(&self) -> &'static str {
        match self {
            ProvenanceMethod::HumanOnly => "Human only",
            ProvenanceMethod::AiAssistedHumanReviewed => "AI-assisted, human reviewed",
            ProvenanceMethod::AiGeneratedHumanReviewed => "AI-generated, human reviewed",
            ProvenanceMethod::AiGeneratedUnreviewed => "AI-generated, unreviewed",
        }
    }

    pub fn involves_ai(&self) -> bool {
        !matches!(self, ProvenanceMethod::HumanOnly)
    }
}

impl fmt::Display for ProvenanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvenanceMethod {
    type Err = OctpError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().replace('-', "_").to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| {
                OctpError::Configuration(format!(
                    "Unknown provenance method '{s}'. Expected one of: {}",
                    Self::ALL.map(|m| m.as_str()).join(", ")
                ))
            })
    }
}

/// How closely a human reviewed the contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewLevel {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "glance")]
    Glance,
    #[serde(rename = "moderate_review")]
    Moderate,
    #[serde(rename = "substantial_modification")]
    Substantial,
    #[serde(rename = "complete_rewrite")]
    Rewrite,
}

impl ReviewLevel {
    pub const ALL: [ReviewLevel; 5] = [
        ReviewLevel::None,
        ReviewLevel::Glance,
        ReviewLevel::Moderate,
        ReviewLevel::Substantial,
        ReviewLevel::Rewrite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewLevel::None => "none",
            ReviewLevel::Glance => "glance",
            ReviewLevel::Moderate => "moderate_review",
            ReviewLevel::Substantial => "substantial_modification",
            ReviewLevel::Rewrite => "complete_rewrite",
        }
    }

    /// Short alias accepted on the command line
    fn alias(&self) -> &'static str {
        match self {
            ReviewLevel::None => "none",
            ReviewLevel::Glance => "glance",
            ReviewLevel::Moderate => "moderate",
            ReviewLevel::Substantial => "substantial",
            ReviewLevel::Rewrite => "rewrite",
        }
    }
}

impl fmt::Display for ReviewLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewLevel {
    type Err = OctpError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().replace('-', "_").to_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized || level.alias() == normalized)
            .ok_or_else(|| {
                OctpError::Configuration(format!(
                    "Unknown review level '{s}'. Expected one of: {}",
                    Self::ALL.map(|l| l.as_str()).join(", ")
                ))
            })
    }
}

/// Tri-state outcome of an automated check category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisResult {
    Passed,
    Failed,
    Skipped,
}

impl AnalysisResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisResult::Passed => "passed",
            AnalysisResult::Failed => "failed",
            AnalysisResult::Skipped => "skipped",
        }
    }
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-assessed confidence level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl FromStr for Confidence {
    type Err = OctpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            other => Err(OctpError::Configuration(format!(
                "Unknown confidence '{other}'. Expected one of: low, medium, high"
            ))),
        }
    }
}

/// An AI tool that took part in producing the contribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiTool {
    pub model: String,
    pub vendor: String,
    pub version: String,
    pub usage_type: String,
}

/// Human declaration about how the change was made
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub method: ProvenanceMethod,
    #[serde(default)]
    pub ai_tools: Option<Vec<AiTool>>,
    pub human_review_level: ReviewLevel,
    #[serde(default)]
    pub human_review_duration_minutes: Option<u32>,
    pub developer_id: String,
}

/// Summary of the automated checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub tests_passed: bool,
    #[serde(default)]
    pub test_suite_hash: Option<String>,
    pub static_analysis: AnalysisResult,
    #[serde(default)]
    pub static_analysis_tool: Option<String>,
    pub dependency_check: AnalysisResult,
    /// Reserved for a future dependency-diff check; always false for now
    pub novel_dependencies_introduced: bool,
}

/// Digest and signature over everything else in the envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integrity {
    pub payload_hash: String,
    pub developer_signature: String,
    pub signature_algorithm: String,
    #[serde(with = "wire_time")]
    pub signed_at: DateTime<Utc>,
}

/// Free-form context the developer may add
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalContext {
    #[serde(default)]
    pub issue_reference: Option<String>,
    #[serde(default)]
    pub self_assessed_confidence: Option<Confidence>,
    #[serde(default)]
    pub areas_of_uncertainty: Option<String>,
    #[serde(default)]
    pub time_in_codebase_minutes: Option<u32>,
}

impl OptionalContext {
    pub fn is_empty(&self) -> bool {
        self.issue_reference.is_none()
            && self.self_assessed_confidence.is_none()
            && self.areas_of_uncertainty.is_none()
            && self.time_in_codebase_minutes.is_none()
    }
}

/// A single trust envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub octp_version: String,
    pub contribution_id: String,
    #[serde(with = "wire_time")]
    pub timestamp: DateTime<Utc>,
    pub repository: String,
    pub commit_hash: String,
    pub provenance: Provenance,
    pub verification: Verification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<Integrity>,
    #[serde(default)]
    pub optional_context: Option<OptionalContext>,
}

impl Envelope {
    pub fn is_signed(&self) -> bool {
        self.integrity.is_some()
    }

    /// The envelope as a JSON document without its integrity section.
    /// This is exactly what gets hashed.
    pub fn signable_value(&self) -> Result<Value> {
        let mut value = to_canonical_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("integrity");
        }
        Ok(value)
    }

    /// Digest of the signable content
    pub fn payload_hash(&self) -> Result<String> {
        Ok(hash_value(&self.signable_value()?))
    }

    /// Attach an integrity section; allowed only once
    pub fn attach_integrity(&mut self, integrity: Integrity) -> Result<()> {
        if self.integrity.is_some() {
            return Err(OctpError::AlreadySigned);
        }
        self.integrity = Some(integrity);
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| OctpError::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| OctpError::EnvelopeParse(e.to_string()))
    }

    /// Persist as pretty-printed JSON
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = self.to_json_pretty()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| OctpError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json + "\n").map_err(|source| OctpError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| OctpError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}
