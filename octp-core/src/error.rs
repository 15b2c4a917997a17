//! Error types with clear, actionable messages
//!
//! Failures local to a single check runner never show up here: they are
//! turned into a failed `CheckResult` at the orchestration boundary. Everything
//! in this enum is fatal to the operation that produced it.

use std::path::PathBuf;
use thiserror::Error;

/// OCTP error taxonomy
#[derive(Error, Debug)]
pub enum OctpError {
    /// No version-control working copy could be read
    #[error("Repository unavailable at {path}: {reason}\n\nRun octp from within a git project.")]
    RepositoryUnavailable { path: PathBuf, reason: String },

    /// Unknown profile name
    #[error("Unknown profile: {name}. Available: {}", choices.join(", "))]
    UnknownProfile { name: String, choices: Vec<String> },

    /// Unknown runner name
    #[error("Unknown runner: {name}. Available: {}", choices.join(", "))]
    UnknownRunner { name: String, choices: Vec<String> },

    /// Any other invalid configuration (bad config file, duplicate runner, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failed to parse the configuration file
    #[error("Failed to parse configuration file {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// A runner outlived its time bound; recorded as a failed check
    #[error("{runner} timed out after {seconds} seconds")]
    RunnerTimeout { runner: String, seconds: u64 },

    /// A runner panicked; recorded as a failed check
    #[error("Runner crashed: {reason}")]
    RunnerCrash { runner: String, reason: String },

    /// Payload could not be put into canonical form
    #[error("Payload is not canonicalizable: {0}")]
    Serialization(String),

    /// Envelope bytes are not a valid envelope
    #[error("Could not parse envelope: {0}")]
    EnvelopeParse(String),

    /// Envelope carries no integrity section
    #[error("No integrity section found in envelope")]
    MissingIntegrity,

    /// Recomputed digest differs from the stored one
    #[error("Payload hash mismatch: envelope has been tampered with\n\nStored hash:     {expected}\nRecomputed hash: {actual}")]
    HashMismatch { expected: String, actual: String },

    /// Signature did not verify against the supplied public key
    #[error("Signature verification failed for the supplied public key")]
    InvalidSignature,

    /// Failed to create a keypair
    #[error("Failed to generate keypair in {path}: {message}")]
    KeyGeneration { path: PathBuf, message: String },

    /// Failed to load an existing key
    #[error("Failed to load key from {path}: {message}")]
    KeyLoad { path: PathBuf, message: String },

    /// The signing primitive failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Integrity may only be attached once
    #[error("Envelope is already signed")]
    AlreadySigned,

    /// Filesystem failure outside key management
    #[error("I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OctpError {
    /// Log integrity violations under the security target
    pub fn log_if_security_critical(&self) {
        match self {
            OctpError::HashMismatch { .. } | OctpError::InvalidSignature => {
                tracing::error!(target: "security", "ENVELOPE INTEGRITY VIOLATION: {}", self);
            }
            _ => {}
        }
    }
}

pub type Result<T, E = OctpError> = std::result::Result<T, E>;
