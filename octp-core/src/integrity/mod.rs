//! Integrity layer: canonical hashing, developer keys and verification
//!
//! - SHA-256 over a canonical JSON form that other implementations reproduce
//!   byte for byte
//! - ECDSA P-256 (ES256) signatures over the hex digest
//! - verification that recomputes the digest from the stored document

pub mod canonical;
pub mod hasher;
pub mod keys;
pub mod verifier;

pub use canonical::{canonical_string, canonicalize, to_canonical_value};
pub use hasher::{hash_files, hash_payload, hash_string, hash_value};
pub use keys::{KeyManager, SIGNATURE_ALGORITHM};
pub use verifier::{EnvelopeVerifier, SignatureStatus, VerificationReport, VerifyOutcome};
