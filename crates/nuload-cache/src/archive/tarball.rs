//! Gzip tarball extraction
//!
//! Only regular files and directories are written; links and special
//! entries are skipped.

use flate2::read::GzDecoder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;

use nuload_core::error::NuloadError;
use nuload_core::utils::safe_join;

use super::EntrySet;
use crate::CacheResult;

fn tar_error(e: io::Error) -> NuloadError {
    NuloadError::archive(format!("invalid tarball: {}", e))
}

/// Entry names, read in a first pass over the archive
fn entry_names(bytes: &[u8]) -> CacheResult<Vec<String>> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    let mut names = Vec::new();

    for entry in archive.entries().map_err(tar_error)? {
        let entry = entry.map_err(tar_error)?;
        let path = entry.path().map_err(tar_error)?;
        names.push(path.to_string_lossy().into_owned());
    }

    Ok(names)
}

/// Extract a gzipped tarball held in memory
pub fn extract_tarball(bytes: &[u8], dest_dir: &Path) -> CacheResult<Vec<PathBuf>> {
    let names = entry_names(bytes)?;
    let entries = EntrySet::new(names.iter().map(String::as_str));

    fs::create_dir_all(dest_dir)
        .map_err(|e| NuloadError::io(format!("Failed to create {}", dest_dir.display()), e))?;

    let mut archive = Archive::new(GzDecoder::new(bytes));
    let mut extracted = Vec::new();

    for entry_result in archive.entries().map_err(tar_error)? {
        let mut entry = entry_result.map_err(tar_error)?;

        let entry_path = entry.path().map_err(tar_error)?.into_owned();
        let name = entry_path.to_string_lossy().into_owned();
        if entries.is_packaging_metadata(&name) {
            continue;
        }

        let safe_path = safe_join(dest_dir, &entry_path)?;

        match entry.header().entry_type() {
            tar::EntryType::Regular => {
                extract_regular_file(&mut entry, &safe_path)?;
                extracted.push(entry_path);
            },
            tar::EntryType::Directory => {
                fs::create_dir_all(&safe_path)
                    .map_err(|e| NuloadError::io(format!("Failed to create {}", safe_path.display()), e))?;
            },
            other => debug!("Skipping {:?} entry {}", other, name),
        }
    }

    Ok(extracted)
}

/// Stream one regular file to disk
fn extract_regular_file<R: io::Read>(entry: &mut tar::Entry<R>, dest_path: &Path) -> CacheResult<()> {
    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| NuloadError::io(format!("Failed to create {}", parent.display()), e))?;
    }

    let mut file = fs::File::create(dest_path)
        .map_err(|e| NuloadError::io(format!("Failed to create {}", dest_path.display()), e))?;

    io::copy(entry, &mut file)
        .map_err(|e| NuloadError::io(format!("Failed to extract {}", dest_path.display()), e))?;

    Ok(())
}
