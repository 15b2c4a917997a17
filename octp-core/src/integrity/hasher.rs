//! SHA-256 digests over canonical payloads and files

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

use super::canonical::{canonical_string, canonicalize};
use crate::error::{OctpError, Result};

/// Digest of the canonical form of `payload` as 64 lowercase hex characters
pub fn hash_payload<T>(payload: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    let canonical = canonicalize(payload)?;
    Ok(hash_string(&canonical))
}

/// Digest of an already-parsed JSON document
pub fn hash_value(value: &Value) -> String {
    hash_string(&canonical_string(value))
}

/// Hash a string using SHA-256
pub fn hash_string(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash the concatenated contents of several files, streamed in order
pub fn hash_files<P: AsRef<Path>>(paths: &[P]) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    for path in paths {
        let path = path.as_ref();
        let mut file = std::fs::File::open(path).map_err(|source| OctpError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        loop {
            let bytes_read = file.read(&mut buffer).map_err(|source| OctpError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
    }

    Ok(hex::encode(hasher.finalize()))
}
