//! Envelope verification
//!
//! The digest is recomputed over the document exactly as loaded, minus its
//! `integrity` member, so envelopes written by any conforming implementation
//! verify without being re-serialized through our types first. Parsing into
//! [`Envelope`] is still required: a document that does not match the schema
//! is a parse error, not a mismatch.

use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use super::hasher::hash_value;
use super::keys;
use crate::envelope::Envelope;
use crate::error::{OctpError, Result};

/// What the digest comparison concluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Match,
    Mismatch { expected: String, actual: String },
    MissingIntegrity,
    ParseError(String),
}

/// Result of checking the signature against a caller-supplied key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    NotChecked,
    Valid,
    Invalid,
}

/// Everything a verification run found out
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub outcome: VerifyOutcome,
    pub signature: SignatureStatus,
    /// The parsed envelope, when the bytes were schema-valid
    pub envelope: Option<Envelope>,
}

impl VerificationReport {
    fn failed(outcome: VerifyOutcome, envelope: Option<Envelope>) -> Self {
        Self {
            outcome,
            signature: SignatureStatus::NotChecked,
            envelope,
        }
    }

    /// Digest matched and no supplied key rejected the signature
    pub fn is_valid(&self) -> bool {
        self.outcome == VerifyOutcome::Match && self.signature != SignatureStatus::Invalid
    }

    /// What a successful verification does and does not establish
    pub fn scope_note(&self) -> &'static str {
        match self.signature {
            SignatureStatus::Valid => {
                "Payload integrity and signature verified against the supplied public key. \
                 The key itself was not checked against any trust registry."
            }
            _ => {
                "Only payload integrity was verified. The signature was not checked \
                 against a trusted public key."
            }
        }
    }

    /// Convert to a `Result` for callers that only care about pass/fail
    pub fn into_result(self) -> Result<Envelope> {
        let error = match (self.outcome, self.signature) {
            (VerifyOutcome::Match, SignatureStatus::Invalid) => OctpError::InvalidSignature,
            (VerifyOutcome::Match, _) => {
                return self
                    .envelope
                    .ok_or_else(|| OctpError::EnvelopeParse("envelope missing".to_string()))
            }
            (VerifyOutcome::Mismatch { expected, actual }, _) => {
                OctpError::HashMismatch { expected, actual }
            }
            (VerifyOutcome::MissingIntegrity, _) => OctpError::MissingIntegrity,
            (VerifyOutcome::ParseError(message), _) => OctpError::EnvelopeParse(message),
        };

        error.log_if_security_critical();
        Err(error)
    }
}

/// Verifies persisted envelopes, optionally against a known public key
#[derive(Debug, Clone, Default)]
pub struct EnvelopeVerifier {
    public_key_pem: Option<String>,
}

impl EnvelopeVerifier {
    /// Verifier that checks payload integrity only
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifier that also checks the signature against `public_key_pem`
    pub fn with_public_key(public_key_pem: impl Into<String>) -> Self {
        Self {
            public_key_pem: Some(public_key_pem.into()),
        }
    }

    /// Verify an envelope file. Only reading the file can fail; everything
    /// about its contents is reported in the outcome.
    pub fn verify_file(&self, path: &Path) -> Result<VerificationReport> {
        let bytes = std::fs::read(path).map_err(|source| OctpError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Verifying envelope {}", path.display());
        Ok(self.verify_bytes(&bytes))
    }

    pub fn verify_bytes(&self, bytes: &[u8]) -> VerificationReport {
        let document: Value = match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(e) => return VerificationReport::failed(VerifyOutcome::ParseError(e.to_string()), None),
        };

        let envelope: Envelope = match serde_json::from_value(document.clone()) {
            Ok(envelope) => envelope,
            Err(e) => return VerificationReport::failed(VerifyOutcome::ParseError(e.to_string()), None),
        };

        let Some(integrity) = envelope.integrity.clone() else {
            return VerificationReport::failed(VerifyOutcome::MissingIntegrity, Some(envelope));
        };

        let mut payload = document;
        if let Value::Object(map) = &mut payload {
            map.remove("integrity");
        }
        let actual = hash_value(&payload);

        if actual != integrity.payload_hash {
            let outcome = VerifyOutcome::Mismatch {
                expected: integrity.payload_hash,
                actual,
            };
            debug!("Envelope digest mismatch: {:?}", outcome);
            return VerificationReport::failed(outcome, Some(envelope));
        }

        let signature = match &self.public_key_pem {
            None => SignatureStatus::NotChecked,
            Some(pem) => {
                if keys::verify(&integrity.payload_hash, &integrity.developer_signature, pem) {
                    SignatureStatus::Valid
                } else {
                    SignatureStatus::Invalid
                }
            }
        };

        debug!("Envelope digest matches; signature {:?}", signature);
        VerificationReport {
            outcome: VerifyOutcome::Match,
            signature,
            envelope: Some(envelope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_parse_error() {
        let report = EnvelopeVerifier::new().verify_bytes(b"{ not json");
        assert!(matches!(report.outcome, VerifyOutcome::ParseError(_)));
        assert!(!report.is_valid());
    }

    #[test]
    fn test_schema_violation_is_parse_error() {
        let report = EnvelopeVerifier::new().verify_bytes(br#"{"octp_version": "0.1"}"#);
        assert!(matches!(report.outcome, VerifyOutcome::ParseError(_)));
        assert!(matches!(
            report.into_result(),
            Err(OctpError::EnvelopeParse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = EnvelopeVerifier::new().verify_file(&tmp.path().join("nope.json"));
        assert!(matches!(result, Err(OctpError::Io { .. })));
    }
}
