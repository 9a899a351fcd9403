//! Utility functions and helpers.
//!
//! Common functionality used across multiple nuload crates.

pub mod hash;
pub mod path;

// Re-export commonly used utilities
pub use hash::{blake3_hash, blake3_hash_file, sha512_base64, verify_integrity, verify_sha512};
pub use path::{get_extension, is_safe_path, normalize_path, safe_join};
