//! Core data types for nuload.
//!
//! This module provides the fundamental types used throughout the workspace:
//! - Version and version range types
//! - Target framework monikers
//! - Package requests, identities and candidates
//! - Dependency edges and groups

pub mod dependency;
pub mod framework;
pub mod package;
pub mod resolved;
pub mod version;

// Re-export all public types
pub use dependency::{select_group, DependencyEdge, DependencyGroup};
pub use framework::{FrameworkFamily, TargetFramework};
pub use package::{
    is_valid_id, normalize_id, CandidatePackage, ContentDescriptor, DependencyBehavior,
    PackageIdentity, PackageRequest, SourceOrigin,
};
pub use resolved::ResolvedSet;
pub use version::{Bound, Version, VersionError, VersionRange};
