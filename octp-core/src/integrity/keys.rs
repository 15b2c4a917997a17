//! Developer signing keys
//!
//! One ECDSA P-256 keypair per developer, stored as two PEM files in a key
//! directory: `private.pem` (PKCS#8, owner-only) and `public.pem` (SPKI).
//! The keypair is created lazily the first time it is needed. Creation is
//! atomic, so concurrent first runs end up sharing a single keypair.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, KeyPair, UnparsedPublicKey, ECDSA_P256_SHA256_ASN1,
    ECDSA_P256_SHA256_ASN1_SIGNING,
};
use std::fmt::Write as _;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{OctpError, Result};

pub const PRIVATE_KEY_FILE: &str = "private.pem";
pub const PUBLIC_KEY_FILE: &str = "public.pem";

/// Algorithm label recorded in every integrity section
pub const SIGNATURE_ALGORITHM: &str = "ES256";

/// Fixed SPKI prefix for an uncompressed P-256 point
#[rustfmt::skip]
const P256_SPKI_HEADER: [u8; 26] = [
    0x30, 0x59,                                     // SEQUENCE (89 bytes)
    0x30, 0x13,                                     // SEQUENCE (19 bytes)
    0x06, 0x07,                                     // OID id-ecPublicKey
    0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01,
    0x06, 0x08,                                     // OID prime256v1
    0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07,
    0x03, 0x42, 0x00,                               // BIT STRING (66 bytes)
];

/// Owns the key directory and performs signing with the stored keypair
#[derive(Debug, Clone)]
pub struct KeyManager {
    keys_dir: PathBuf,
}

impl KeyManager {
    pub fn new(keys_dir: impl Into<PathBuf>) -> Self {
        Self {
            keys_dir: keys_dir.into(),
        }
    }

    pub fn keys_dir(&self) -> &Path {
        &self.keys_dir
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.keys_dir.join(PRIVATE_KEY_FILE)
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.keys_dir.join(PUBLIC_KEY_FILE)
    }

    /// Whether both key files are present
    pub fn has_keypair(&self) -> bool {
        self.private_key_path().is_file() && self.public_key_path().is_file()
    }

    /// Make sure a usable keypair exists, creating it if absent.
    ///
    /// Safe to call from several processes at once: exactly one private key
    /// wins and every caller uses it afterwards.
    pub fn ensure_keypair(&self) -> Result<()> {
        if !self.private_key_path().exists() {
            self.generate_keypair()?;
        }

        if !self.public_key_path().exists() {
            debug!("Public key missing, re-deriving from private key");
            let rng = SystemRandom::new();
            let key_pair = self.load_private_key(&rng)?;
            self.write_public_key(&key_pair)?;
        }

        Ok(())
    }

    /// Sign a hex digest. Returns the base64 of an ASN.1 DER ECDSA signature
    /// over the digest's UTF-8 bytes.
    pub fn sign(&self, digest: &str) -> Result<String> {
        self.ensure_keypair()?;

        let rng = SystemRandom::new();
        let key_pair = self.load_private_key(&rng)?;
        let signature = key_pair
            .sign(&rng, digest.as_bytes())
            .map_err(|e| OctpError::Signing(format!("ECDSA P-256 signing failed: {e}")))?;

        Ok(STANDARD.encode(signature.as_ref()))
    }

    /// Public key as SPKI PEM text, creating the keypair if needed
    pub fn public_key_pem(&self) -> Result<String> {
        self.ensure_keypair()?;

        let path = self.public_key_path();
        fs::read_to_string(&path).map_err(|e| OctpError::KeyLoad {
            path,
            message: e.to_string(),
        })
    }

    fn generate_keypair(&self) -> Result<()> {
        let keygen_error = |message: String| OctpError::KeyGeneration {
            path: self.keys_dir.clone(),
            message,
        };

        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .map_err(|e| keygen_error(format!("key generation failed: {e}")))?;

        fs::create_dir_all(&self.keys_dir)
            .map_err(|e| keygen_error(format!("cannot create key directory: {e}")))?;

        let pem = der_to_pem(pkcs8.as_ref(), "PRIVATE KEY");
        let staged = stage_file(&self.keys_dir, &pem, 0o600)
            .map_err(|e| keygen_error(format!("cannot stage private key: {e}")))?;

        match staged.persist_noclobber(self.private_key_path()) {
            Ok(_) => {
                info!("Generated signing key in {}", self.keys_dir.display());
                let key_pair =
                    EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
                        .map_err(|e| keygen_error(format!("generated key rejected: {e}")))?;
                self.write_public_key(&key_pair)
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!("Another process created the signing key first; using it");
                Ok(())
            }
            Err(e) => Err(keygen_error(format!("cannot store private key: {}", e.error))),
        }
    }

    fn load_private_key(&self, rng: &SystemRandom) -> Result<EcdsaKeyPair> {
        let path = self.private_key_path();
        let load_error = |message: String| OctpError::KeyLoad {
            path: path.clone(),
            message,
        };

        let pem = fs::read_to_string(&path).map_err(|e| load_error(e.to_string()))?;
        let der = pem_to_der(&pem).ok_or_else(|| load_error("invalid PEM encoding".into()))?;

        EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &der, rng)
            .map_err(|e| load_error(format!("not a P-256 PKCS#8 key: {e}")))
    }

    fn write_public_key(&self, key_pair: &EcdsaKeyPair) -> Result<()> {
        let path = self.public_key_path();
        let spki = encode_p256_spki(key_pair.public_key().as_ref());
        let pem = der_to_pem(&spki, "PUBLIC KEY");

        let staged = stage_file(&self.keys_dir, &pem, 0o644).map_err(|e| {
            OctpError::KeyGeneration {
                path: path.clone(),
                message: format!("cannot stage public key: {e}"),
            }
        })?;

        // Overwriting is fine: every writer derives the same bytes
        staged.persist(&path).map_err(|e| OctpError::KeyGeneration {
            path,
            message: format!("cannot store public key: {}", e.error),
        })?;

        Ok(())
    }
}

/// Write `contents` to a temp file inside `dir` with the given mode
fn stage_file(dir: &Path, contents: &str, mode: u32) -> std::io::Result<NamedTempFile> {
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(contents.as_bytes())?;
    staged.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staged.path(), fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(staged)
}

/// Check an ES256 signature over a hex digest against a PEM public key.
///
/// Never fails: malformed input of any kind yields `false`.
pub fn verify(digest: &str, signature_b64: &str, public_key_pem: &str) -> bool {
    let Ok(signature) = STANDARD.decode(signature_b64.trim()) else {
        return false;
    };
    let Some(spki) = pem_to_der(public_key_pem) else {
        return false;
    };
    let Some(point) = spki.strip_prefix(&P256_SPKI_HEADER[..]) else {
        return false;
    };

    UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, point)
        .verify(digest.as_bytes(), &signature)
        .is_ok()
}

/// Wrap DER bytes in PEM with the given label
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let b64 = STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {label}-----\n");
    for chunk in b64.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    let _ = writeln!(pem, "-----END {label}-----");
    pem
}

/// Extract DER bytes from a PEM string
pub fn pem_to_der(pem: &str) -> Option<Vec<u8>> {
    let mut b64 = String::new();
    let mut in_body = false;

    for line in pem.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("-----BEGIN ") {
            in_body = true;
            continue;
        }
        if trimmed.starts_with("-----END ") {
            break;
        }
        if in_body {
            b64.push_str(trimmed);
        }
    }

    if b64.is_empty() {
        return None;
    }
    STANDARD.decode(&b64).ok()
}

/// Wrap an uncompressed P-256 point in `SubjectPublicKeyInfo` DER
pub fn encode_p256_spki(point: &[u8]) -> Vec<u8> {
    let mut spki = Vec::with_capacity(P256_SPKI_HEADER.len() + point.len());
    spki.extend_from_slice(&P256_SPKI_HEADER);
    spki.extend_from_slice(point);
    spki
}
