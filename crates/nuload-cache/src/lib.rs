//! Package acquisition for nuload
//!
//! This crate keeps downloaded `.nupkg` artifacts in an on-disk cache,
//! extracts them into per-package directories under a target root and picks
//! the `lib/<tfm>/` folder a host framework should load.

pub mod archive;
pub mod install;
pub mod platform;
pub mod store;

// Re-export main types
pub use archive::{extract_archive, ArchiveFormat};
pub use install::{InstallStatus, InstalledPackage, Installer, DEFAULT_INSTALL_CONCURRENCY};
pub use platform::{select_target, TargetSelection};
pub use store::{ArtifactEntry, CacheSummary, PackageCache};

use nuload_core::error::NuloadError;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, NuloadError>;
