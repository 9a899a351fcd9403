//! Package archive extraction
//!
//! `.nupkg` files are zip archives; gzip tarballs are accepted too. The
//! format is sniffed from the leading magic bytes, not the file name. Entry
//! paths are joined onto the destination only after a traversal check, and
//! NuGet packaging metadata is left out of the extracted tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use nuload_core::error::NuloadError;

use crate::CacheResult;

pub mod tarball;
pub mod zipfile;

pub use self::tarball::extract_tarball;
pub use self::zipfile::extract_zip;

/// Archive container formats understood by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// Detect the format from magic bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [b'P', b'K', 3, 4, ..] | [b'P', b'K', 5, 6, ..] => Some(Self::Zip),
            [0x1f, 0x8b, ..] => Some(Self::TarGz),
            _ => None,
        }
    }
}

/// Extract `bytes` into `dest_dir`, returning the written files relative to it
pub fn extract_archive(bytes: &[u8], dest_dir: &Path) -> CacheResult<Vec<PathBuf>> {
    match ArchiveFormat::sniff(bytes) {
        Some(ArchiveFormat::Zip) => extract_zip(bytes, dest_dir),
        Some(ArchiveFormat::TarGz) => extract_tarball(bytes, dest_dir),
        None => Err(NuloadError::archive("unrecognized archive format (expected zip or gzip tarball)")),
    }
}

/// Entry names of one archive, used to recognise documentation files
#[derive(Debug, Default)]
pub(crate) struct EntrySet {
    lowercase: HashSet<String>,
}

impl EntrySet {
    pub(crate) fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            lowercase: names.into_iter().map(|n| normalize_entry(n).to_lowercase()).collect(),
        }
    }

    /// Whether `name` is NuGet packaging metadata rather than package content
    pub(crate) fn is_packaging_metadata(&self, name: &str) -> bool {
        let name = normalize_entry(name).to_lowercase();

        if name == "[content_types].xml" || name == ".signature.p7s" {
            return true;
        }
        if name.starts_with("_rels/") || name.starts_with("package/") {
            return true;
        }

        // XML documentation next to an assembly of the same name
        match name.strip_suffix(".xml") {
            Some(stem) => ["dll", "exe"]
                .iter()
                .any(|ext| self.lowercase.contains(&format!("{}.{}", stem, ext))),
            None => false,
        }
    }
}

/// Forward slashes, no leading "./" or "/"
fn normalize_entry(name: &str) -> String {
    let name = name.replace('\\', "/");
    name.trim_start_matches("./").trim_start_matches('/').to_string()
}
