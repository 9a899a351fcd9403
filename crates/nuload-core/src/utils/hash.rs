//! Hashing utilities for content integrity.
//!
//! BLAKE3 guards the local download cache; SHA-512 (base64) is the digest
//! NuGet registries publish for package artifacts.

use crate::error::{NuloadError, NuloadResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha512};

/// Compute Blake3 hash of data
pub fn blake3_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.to_hex().to_string()
}

/// Compute Blake3 hash of a file
pub fn blake3_hash_file(path: &std::path::Path) -> NuloadResult<String> {
    let data = std::fs::read(path)
        .map_err(|e| NuloadError::io(format!("Failed to read file: {}", path.display()), e))?;
    Ok(blake3_hash(&data))
}

/// Verify data against an expected Blake3 hash
pub fn verify_integrity(package: &str, data: &[u8], expected_hash: &str) -> NuloadResult<()> {
    let actual_hash = blake3_hash(data);
    if actual_hash == expected_hash {
        Ok(())
    } else {
        Err(NuloadError::IntegrityFailure {
            package: package.to_string(),
            expected: expected_hash.to_string(),
            actual: actual_hash,
        })
    }
}

/// Base64 SHA-512 digest, the form used in registry metadata
pub fn sha512_base64(data: &[u8]) -> String {
    STANDARD.encode(Sha512::digest(data))
}

/// Verify data against a registry-reported SHA-512 hash
pub fn verify_sha512(package: &str, data: &[u8], expected: &str) -> NuloadResult<()> {
    let actual = sha512_base64(data);
    if actual == expected.trim() {
        Ok(())
    } else {
        Err(NuloadError::IntegrityFailure {
            package: package.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}
