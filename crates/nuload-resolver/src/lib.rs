//! Dependency gathering and version resolution for nuload
//!
//! This crate turns package requests into a conflict-free set of packages:
//! - `host`: drops dependencies the hosting environment already supplies
//! - `gather`: walks registries to build the candidate universe
//! - `solver`: picks exactly one version per package id
//! - `graph`: orders the selection dependencies-first

pub mod gather;
pub mod graph;
pub mod host;
pub mod solver;

// Re-export main types
pub use gather::{GraphBuilder, Universe, DEFAULT_CONCURRENCY};
pub use graph::ResolvedGraph;
pub use host::HostEnvironment;
pub use solver::{Resolver, DEFAULT_STEP_LIMIT};

use nuload_core::error::NuloadError;

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, NuloadError>;
