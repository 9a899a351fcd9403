//! Materializes a resolved set into a package directory.
//!
//! Each package is fetched (cache first, then its origin), extracted into a
//! `.tmp-*` directory inside the target root and renamed to
//! `<target_root>/<id>.<version>/`. A package directory is therefore either
//! absent or complete.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use nuload_core::error::NuloadError;
use nuload_core::utils::verify_sha512;
use nuload_core::{CandidatePackage, PackageIdentity, ResolvedSet};
use nuload_registry::SourceSet;

use crate::archive::extract_archive;
use crate::store::PackageCache;
use crate::CacheResult;

/// Default number of packages fetched and extracted at once
pub const DEFAULT_INSTALL_CONCURRENCY: usize = 4;

/// What happened to one package during materialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    /// Extracted by this call
    Extracted,
    /// The package directory already existed
    AlreadyPresent,
}

/// One package directory under the target root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub identity: PackageIdentity,
    pub path: PathBuf,
    pub status: InstallStatus,
    /// The artifact came from the download cache
    pub from_cache: bool,
    /// Number of files written
    pub files: usize,
}

/// State shared by the per-package tasks
#[derive(Debug)]
struct Context {
    sources: SourceSet,
    cache: PackageCache,
    target_root: PathBuf,
    semaphore: Semaphore,
    cancel: CancellationToken,
}

/// Downloads and extracts resolved packages
#[derive(Debug, Clone)]
pub struct Installer {
    sources: SourceSet,
    cache: PackageCache,
    concurrency: usize,
}

impl Installer {
    pub fn new(sources: SourceSet, cache: PackageCache) -> Self {
        Self {
            sources,
            cache,
            concurrency: DEFAULT_INSTALL_CONCURRENCY,
        }
    }

    /// Limit the number of packages processed at once (minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn cache(&self) -> &PackageCache {
        &self.cache
    }

    /// Install every package of `resolved` under `target_root`
    ///
    /// The first failure aborts the remaining work and is returned. The
    /// result lists packages in the order of `resolved`.
    pub async fn materialize(
        &self,
        resolved: &ResolvedSet,
        target_root: &Path,
        cancel: &CancellationToken,
    ) -> CacheResult<Vec<InstalledPackage>> {
        tokio::fs::create_dir_all(target_root)
            .await
            .map_err(|e| NuloadError::io(format!("Failed to create {}", target_root.display()), e))?;

        let context = Arc::new(Context {
            sources: self.sources.clone(),
            cache: self.cache.clone(),
            target_root: target_root.to_path_buf(),
            semaphore: Semaphore::new(self.concurrency),
            cancel: cancel.clone(),
        });

        let mut tasks: JoinSet<(usize, CacheResult<InstalledPackage>)> = JoinSet::new();
        for (index, package) in resolved.iter().cloned().enumerate() {
            let context = Arc::clone(&context);
            tasks.spawn(async move { (index, install_one(context, package).await) });
        }

        let mut installed = Vec::with_capacity(resolved.len());
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(|e| NuloadError::Internal {
                message: format!("install task failed: {}", e),
            })?;

            match result {
                Ok(package) => installed.push((index, package)),
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                },
            }
        }

        installed.sort_by_key(|(index, _)| *index);
        let installed: Vec<InstalledPackage> = installed.into_iter().map(|(_, p)| p).collect();

        let extracted = installed
            .iter()
            .filter(|p| p.status == InstallStatus::Extracted)
            .count();
        info!(
            "Materialized {} packages into {} ({} extracted, {} already present)",
            installed.len(),
            target_root.display(),
            extracted,
            installed.len() - extracted
        );

        Ok(installed)
    }
}

/// Fetch and extract one package, wrapping failures with its identity
async fn install_one(context: Arc<Context>, package: CandidatePackage) -> CacheResult<InstalledPackage> {
    let _permit = context
        .semaphore
        .acquire()
        .await
        .map_err(|_| NuloadError::Internal {
            message: "install semaphore closed".to_string(),
        })?;

    let identity = package.identity.clone();
    let dest = context.target_root.join(identity.dir_name());

    if dest.exists() {
        debug!("{} is already installed", identity);
        return Ok(InstalledPackage {
            identity,
            path: dest,
            status: InstallStatus::AlreadyPresent,
            from_cache: false,
            files: 0,
        });
    }

    let wrap = |e: NuloadError| match e {
        NuloadError::Cancelled => NuloadError::Cancelled,
        other => NuloadError::acquisition(
            &package.identity.id,
            &package.identity.version.to_string(),
            &package.origin.name,
            other,
        ),
    };

    let (bytes, from_cache) = fetch(&context, &package).await.map_err(wrap)?;

    if context.cancel.is_cancelled() {
        return Err(NuloadError::Cancelled);
    }

    let target_root = context.target_root.clone();
    let staged_dest = dest.clone();
    let files = tokio::task::spawn_blocking(move || stage(&target_root, &staged_dest, &bytes))
        .await
        .map_err(|e| NuloadError::Internal {
            message: format!("extraction task failed: {}", e),
        })?
        .map_err(wrap)?;

    let status = match files {
        Some(_) => InstallStatus::Extracted,
        None => InstallStatus::AlreadyPresent,
    };
    debug!("{} -> {} ({:?})", identity, dest.display(), status);

    Ok(InstalledPackage {
        identity,
        path: dest,
        status,
        from_cache,
        files: files.unwrap_or(0),
    })
}

/// Artifact bytes from the cache, or downloaded and cached
async fn fetch(context: &Context, package: &CandidatePackage) -> CacheResult<(Vec<u8>, bool)> {
    let identity = package.identity.clone();
    let location = package.origin.location.clone();

    let cache = context.cache.clone();
    let (lookup_identity, lookup_location) = (identity.clone(), location.clone());
    let cached = tokio::task::spawn_blocking(move || cache.get(&lookup_identity, &lookup_location))
        .await
        .map_err(|e| NuloadError::Internal {
            message: format!("cache lookup task failed: {}", e),
        })??;

    if let Some(bytes) = cached {
        return Ok((bytes, true));
    }

    let content = package
        .content
        .as_ref()
        .ok_or_else(|| NuloadError::PackageNotFound {
            id: identity.id.clone(),
            range: format!("[{}]", identity.version),
        })?;

    let bytes = context
        .sources
        .download(&package.origin, &identity, content, &context.cancel)
        .await?;
    debug!("Downloaded {} ({} bytes) from {}", identity, bytes.len(), package.origin);

    if let Some(expected) = &content.sha512 {
        verify_sha512(&identity.to_string(), &bytes, expected)?;
    }

    let cache = context.cache.clone();
    tokio::task::spawn_blocking(move || cache.store(&identity, &location, &bytes).map(|_| bytes))
        .await
        .map_err(|e| NuloadError::Internal {
            message: format!("cache write task failed: {}", e),
        })?
        .map(|bytes| (bytes, false))
}

/// Extract into a staging directory and rename it to `dest`
///
/// Returns `None` when another writer created `dest` first.
fn stage(target_root: &Path, dest: &Path, bytes: &[u8]) -> CacheResult<Option<usize>> {
    let staging = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempdir_in(target_root)
        .map_err(|e| NuloadError::io(format!("Failed to create staging directory in {}", target_root.display()), e))?;

    let files = extract_archive(bytes, staging.path())?;

    // After a successful rename the staging guard points at nothing
    match fs::rename(staging.path(), dest) {
        Ok(()) => Ok(Some(files.len())),
        Err(_) if dest.exists() => Ok(None),
        Err(e) => Err(NuloadError::io(format!("Failed to move package into {}", dest.display()), e)),
    }
}

#[cfg(test)]
mod tests;
