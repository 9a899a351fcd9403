//! Zip (`.nupkg`) extraction

use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use nuload_core::error::NuloadError;
use nuload_core::utils::safe_join;

use super::EntrySet;
use crate::CacheResult;

/// Extract a zip archive held in memory
pub fn extract_zip(bytes: &[u8], dest_dir: &Path) -> CacheResult<Vec<PathBuf>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| NuloadError::archive(format!("invalid zip archive: {}", e)))?;

    let entries = EntrySet::new(archive.file_names());

    fs::create_dir_all(dest_dir)
        .map_err(|e| NuloadError::io(format!("Failed to create {}", dest_dir.display()), e))?;

    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| NuloadError::archive(format!("unreadable zip entry {}: {}", i, e)))?;

        let name = file.name().to_string();
        let relative_path = match file.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                return Err(NuloadError::archive(format!(
                    "entry '{}' escapes the extraction directory",
                    name
                )))
            },
        };

        if entries.is_packaging_metadata(&name) {
            continue;
        }

        let absolute_path = safe_join(dest_dir, &relative_path)?;

        if file.is_dir() {
            fs::create_dir_all(&absolute_path)
                .map_err(|e| NuloadError::io(format!("Failed to create {}", absolute_path.display()), e))?;
            continue;
        }

        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| NuloadError::io(format!("Failed to create {}", parent.display()), e))?;
        }

        let mut outfile = fs::File::create(&absolute_path)
            .map_err(|e| NuloadError::io(format!("Failed to create {}", absolute_path.display()), e))?;
        io::copy(&mut file, &mut outfile)
            .map_err(|e| NuloadError::io(format!("Failed to extract {}", name), e))?;

        extracted.push(relative_path);
    }

    Ok(extracted)
}
