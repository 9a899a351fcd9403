//! The package source port and cancellation helper.

use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use nuload_core::error::NuloadError;
use nuload_core::{ContentDescriptor, DependencyEdge, PackageIdentity, SourceOrigin, TargetFramework, Version};

use crate::RegistryResult;

/// Dependency information for one package version, scoped to a framework
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInfo {
    pub identity: PackageIdentity,
    pub dependencies: Vec<DependencyEdge>,
    pub content: Option<ContentDescriptor>,
}

/// A registry or feed that can list, describe and serve packages
///
/// "Not found" is an `Ok` answer (an empty list or `None`); errors are
/// reserved for failures to reach or read the source.
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Name and location of this source
    fn origin(&self) -> &SourceOrigin;

    /// All versions the source lists for `id`, in no particular order
    async fn list_versions(&self, id: &str) -> RegistryResult<Vec<Version>>;

    /// Dependencies of `identity` that apply to `framework`
    async fn dependency_info(
        &self,
        identity: &PackageIdentity,
        framework: &TargetFramework,
    ) -> RegistryResult<Option<DependencyInfo>>;

    /// Fetch the raw package artifact
    async fn download(
        &self,
        identity: &PackageIdentity,
        content: &ContentDescriptor,
    ) -> RegistryResult<Vec<u8>>;
}

/// Race `future` against `cancel`, yielding `NuloadError::Cancelled` if the token fires first
pub async fn cancellable<F, T>(cancel: &CancellationToken, future: F) -> RegistryResult<T>
where
    F: Future<Output = RegistryResult<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(NuloadError::Cancelled),
        result = future => result,
    }
}
