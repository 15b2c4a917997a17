//! `octp verify`

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

use octp_core::config::OctpConfig;
use octp_core::integrity::{EnvelopeVerifier, KeyManager, SignatureStatus, VerifyOutcome};

use crate::display;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Envelope file to verify
    file: PathBuf,

    /// Check the signature against this PEM public key
    #[clap(long, conflicts_with = "local_key")]
    public_key: Option<PathBuf>,

    /// Check the signature against this machine's own public key
    #[clap(long)]
    local_key: bool,

    /// Key directory used with --local-key
    #[clap(long, requires = "local_key")]
    keys_dir: Option<PathBuf>,

    /// Print the report as JSON
    #[clap(long)]
    json: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    file: &'a Path,
    valid: bool,
    payload: &'static str,
    signature: &'static str,
    detail: Option<String>,
}

impl VerifyArgs {
    pub fn execute(self) -> Result<()> {
        let verifier = match self.trusted_key()? {
            Some(pem) => EnvelopeVerifier::with_public_key(pem),
            None => EnvelopeVerifier::new(),
        };

        let report = verifier
            .verify_file(&self.file)
            .with_context(|| format!("Failed to read {}", self.file.display()))?;

        if self.json {
            let (payload, detail) = match &report.outcome {
                VerifyOutcome::Match => ("match", None),
                VerifyOutcome::Mismatch { expected, actual } => (
                    "mismatch",
                    Some(format!("recorded {expected}, computed {actual}")),
                ),
                VerifyOutcome::MissingIntegrity => ("missing_integrity", None),
                VerifyOutcome::ParseError(message) => ("parse_error", Some(message.clone())),
            };
            let signature = match report.signature {
                SignatureStatus::NotChecked => "not_checked",
                SignatureStatus::Valid => "valid",
                SignatureStatus::Invalid => "invalid",
            };
            let json = JsonReport {
                file: &self.file,
                valid: report.is_valid(),
                payload,
                signature,
                detail,
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        } else {
            display::print_verification(&report, &self.file);
        }

        if !report.is_valid() {
            // Logs the security-relevant failure and carries its message
            let error = report
                .into_result()
                .err()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "verification failed".to_string());
            bail!("Envelope {} failed verification: {error}", self.file.display());
        }

        Ok(())
    }

    /// PEM text of the key to check signatures against, if any
    fn trusted_key(&self) -> Result<Option<String>> {
        if let Some(path) = &self.public_key {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read public key {}", path.display()))?;
            return Ok(Some(pem));
        }

        if self.local_key {
            let config = OctpConfig::load(Path::new(".")).context("Failed to load configuration")?;
            let keys = KeyManager::new(config.resolve_keys_dir(self.keys_dir.clone()));
            let path = keys.public_key_path();
            // Verifying must never mint a key
            if !path.is_file() {
                bail!("No local public key at {}", path.display());
            }
            let pem = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read public key {}", path.display()))?;
            return Ok(Some(pem));
        }

        Ok(None)
    }
}
