//! Package sources for nuload
//!
//! This crate provides the Registry Client: the `PackageSource` trait, a NuGet
//! v3 HTTP client with connection pooling, retry logic and metadata caching,
//! a directory-backed local feed, and `SourceSet`, which queries sources in
//! priority order.

pub mod api;
pub mod cache;
pub mod client;
pub mod local;
pub mod source;
pub mod sources;

// Re-export main types
pub use api::{CatalogEntry, RegistrationIndex, RegistrationLeaf, RegistrationPage, ServiceIndex};
pub use cache::{CacheEntry, CacheStats, MetadataCache};
pub use client::{AuthConfig, NugetClient, RetryConfig};
pub use local::{FeedPackage, LocalFeed};
pub use source::{cancellable, DependencyInfo, PackageSource};
pub use sources::SourceSet;

use nuload_core::error::NuloadError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, NuloadError>;
