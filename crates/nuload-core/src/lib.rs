//! # nuload-core
//!
//! Core types and utilities shared across all nuload crates.
//!
//! This crate provides:
//! - NuGet-style `Version` and `VersionRange` types
//! - `TargetFramework` parsing and nearest-framework selection
//! - Package identity, request, candidate and resolved-set types
//! - `NuloadError` enum for unified error handling
//! - Hashing and path helpers used by the cache and registry crates
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (Version, PackageIdentity, etc.)
//! - `error`: Error types and result aliases
//! - `utils`: Utility functions and helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{NuloadError, NuloadResult};
pub use types::{
    CandidatePackage, ContentDescriptor, DependencyBehavior, DependencyEdge, DependencyGroup,
    PackageIdentity, PackageRequest, ResolvedSet, SourceOrigin, TargetFramework, Version,
    VersionRange,
};
