//! Download cache for package artifacts
//!
//! Artifacts are keyed by (id, version, origin) and laid out as
//! `<root>/<origin key>/<id>/<version>/<id>.<version>.nupkg` with a JSON
//! sidecar recording the BLAKE3 hash. Every file is written to a temporary
//! file in the same directory and renamed into place, so concurrent writers
//! on distinct keys never see each other's partial files.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use nuload_core::error::NuloadError;
use nuload_core::types::normalize_id;
use nuload_core::utils::blake3_hash;
use nuload_core::PackageIdentity;

use crate::CacheResult;

pub mod entry;

pub use entry::{ArtifactEntry, CacheSummary};

const META_SUFFIX: &str = ".meta.json";

/// On-disk artifact cache
#[derive(Debug, Clone)]
pub struct PackageCache {
    /// Root directory for storage (~/.nuload/packages)
    root_path: Utf8PathBuf,
}

impl PackageCache {
    /// Open a cache rooted at `root_path`, creating the directory if needed
    pub fn new<P: AsRef<Utf8Path>>(root_path: P) -> CacheResult<Self> {
        let root_path = root_path.as_ref().to_path_buf();

        fs::create_dir_all(&root_path)
            .map_err(|e| NuloadError::io(format!("Failed to create cache directory {}", root_path), e))?;

        Ok(Self { root_path })
    }

    /// Get the root path of the cache
    pub fn root_path(&self) -> &Utf8Path {
        &self.root_path
    }

    fn entry_dir(&self, identity: &PackageIdentity, origin: &str) -> Utf8PathBuf {
        let origin_key = &blake3_hash(origin.as_bytes())[..16];
        self.root_path
            .join(origin_key)
            .join(normalize_id(&identity.id))
            .join(identity.version.normalized().to_lowercase())
    }

    /// Where the artifact for `identity` from `origin` is stored
    pub fn artifact_path(&self, identity: &PackageIdentity, origin: &str) -> Utf8PathBuf {
        self.entry_dir(identity, origin)
            .join(format!("{}.nupkg", identity.dir_name().to_lowercase()))
    }

    fn meta_path(&self, identity: &PackageIdentity, origin: &str) -> Utf8PathBuf {
        let artifact = self.artifact_path(identity, origin);
        Utf8PathBuf::from(format!("{}{}", artifact, META_SUFFIX))
    }

    /// Check if an artifact and its metadata are present
    pub fn contains(&self, identity: &PackageIdentity, origin: &str) -> bool {
        self.artifact_path(identity, origin).exists() && self.meta_path(identity, origin).exists()
    }

    /// Cached artifact bytes, or `None` when absent or no longer intact
    ///
    /// An entry whose bytes no longer match the recorded hash is removed so
    /// the caller downloads it again.
    pub fn get(&self, identity: &PackageIdentity, origin: &str) -> CacheResult<Option<Vec<u8>>> {
        let meta_path = self.meta_path(identity, origin);
        let raw = match fs::read_to_string(&meta_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(NuloadError::io(format!("Failed to read {}", meta_path), e)),
        };

        let mut entry: ArtifactEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", meta_path, e);
                self.evict(&meta_path);
                return Ok(None);
            },
        };

        let artifact_path = self.artifact_path(identity, origin);
        let content = match fs::read(&artifact_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Cache entry for {} has no artifact; downloading again", identity);
                self.evict(&meta_path);
                return Ok(None);
            },
            Err(e) => return Err(NuloadError::io(format!("Failed to read {}", artifact_path), e)),
        };

        if content.len() as u64 != entry.size || blake3_hash(&content) != entry.blake3 {
            warn!("Cached artifact for {} is corrupted; downloading again", identity);
            self.evict(&meta_path);
            return Ok(None);
        }

        entry.touch();
        if let Err(e) = self.write_meta(&meta_path, &entry) {
            warn!("Failed to update access time for {}: {}", identity, e);
        }

        debug!("Cache hit for {} ({} bytes)", identity, content.len());
        Ok(Some(content))
    }

    /// Store artifact bytes and return the recorded entry
    pub fn store(&self, identity: &PackageIdentity, origin: &str, content: &[u8]) -> CacheResult<ArtifactEntry> {
        let artifact_path = self.artifact_path(identity, origin);
        let entry = ArtifactEntry::new(identity, origin, blake3_hash(content), content.len() as u64);

        write_atomic(&artifact_path, content)?;
        self.write_meta(&self.meta_path(identity, origin), &entry)?;

        debug!("Cached {} at {}", identity, artifact_path);
        Ok(entry)
    }

    /// Verify the cached artifact still matches its recorded hash
    pub fn verify(&self, identity: &PackageIdentity, origin: &str) -> CacheResult<bool> {
        Ok(self.get(identity, origin)?.is_some())
    }

    /// Every readable entry in the cache
    pub fn entries(&self) -> CacheResult<Vec<ArtifactEntry>> {
        Ok(self.scan().into_iter().map(|(_, entry)| entry).collect())
    }

    /// Entry count and total size
    pub fn summary(&self) -> CacheResult<CacheSummary> {
        let mut summary = CacheSummary::default();
        for entry in self.entries()? {
            summary.add(&entry);
        }
        Ok(summary)
    }

    /// Remove everything in the cache and report what was freed
    pub fn clear(&self) -> CacheResult<CacheSummary> {
        let summary = self.summary()?;

        let children = match fs::read_dir(&self.root_path) {
            Ok(children) => children,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(summary),
            Err(e) => return Err(NuloadError::io(format!("Failed to list {}", self.root_path), e)),
        };

        for child in children {
            let child = child.map_err(|e| NuloadError::io(format!("Failed to list {}", self.root_path), e))?;
            let path = child.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(|e| NuloadError::io(format!("Failed to remove {}", path.display()), e))?;
        }

        Ok(summary)
    }

    /// Remove entries not read for `max_age_days` days
    pub fn prune(&self, max_age_days: i64) -> CacheResult<CacheSummary> {
        let threshold = Utc::now().timestamp() - max_age_days * 24 * 60 * 60;
        let mut removed = CacheSummary::default();

        for (meta_path, entry) in self.scan() {
            if entry.last_accessed <= threshold {
                self.evict(&meta_path);
                removed.add(&entry);
            }
        }

        Ok(removed)
    }

    /// Sidecar files and their parsed entries
    fn scan(&self) -> Vec<(Utf8PathBuf, ArtifactEntry)> {
        WalkDir::new(&self.root_path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| Utf8PathBuf::from_path_buf(e.into_path()).ok())
            .filter(|path| path.as_str().ends_with(META_SUFFIX))
            .filter_map(|path| {
                let raw = fs::read_to_string(&path).ok()?;
                match serde_json::from_str::<ArtifactEntry>(&raw) {
                    Ok(entry) => Some((path, entry)),
                    Err(e) => {
                        warn!("Skipping unreadable cache entry {}: {}", path, e);
                        None
                    },
                }
            })
            .collect()
    }

    fn write_meta(&self, meta_path: &Utf8Path, entry: &ArtifactEntry) -> CacheResult<()> {
        let json = serde_json::to_vec_pretty(entry).map_err(|e| NuloadError::Internal {
            message: format!("Failed to serialize cache entry: {}", e),
        })?;
        write_atomic(meta_path, &json)
    }

    /// Remove a sidecar and its artifact
    fn evict(&self, meta_path: &Utf8Path) {
        let artifact_path = meta_path.as_str().trim_end_matches(META_SUFFIX);
        for path in [artifact_path, meta_path.as_str()] {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", path, e);
                }
            }
        }
    }
}

/// Write `content` to a temporary sibling of `path`, then rename it into place
fn write_atomic(path: &Utf8Path, content: &[u8]) -> CacheResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| NuloadError::Internal {
            message: format!("cache path {} has no parent", path),
        })?;

    fs::create_dir_all(dir).map_err(|e| NuloadError::io(format!("Failed to create {}", dir), e))?;

    let mut file = NamedTempFile::new_in(dir)
        .map_err(|e| NuloadError::io(format!("Failed to create temporary file in {}", dir), e))?;
    file.write_all(content)
        .map_err(|e| NuloadError::io(format!("Failed to write {}", path), e))?;
    file.persist(path)
        .map_err(|e| NuloadError::io(format!("Failed to move {} into place", path), e.error))?;

    Ok(())
}
