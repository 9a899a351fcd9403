//! Ordered collection of package sources.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use nuload_core::error::NuloadError;
use nuload_core::{ContentDescriptor, PackageIdentity, SourceOrigin, TargetFramework, Version};

use crate::source::{cancellable, DependencyInfo, PackageSource};
use crate::RegistryResult;

/// Sources in priority order; the first source with an answer wins
#[derive(Clone, Default)]
pub struct SourceSet {
    sources: Vec<Arc<dyn PackageSource>>,
}

impl std::fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.origin()))
            .finish()
    }
}

impl SourceSet {
    pub fn new(sources: Vec<Arc<dyn PackageSource>>) -> Self {
        Self { sources }
    }

    pub fn push(&mut self, source: Arc<dyn PackageSource>) {
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn origins(&self) -> Vec<SourceOrigin> {
        self.sources.iter().map(|s| s.origin().clone()).collect()
    }

    /// Versions of `id` from the first source that lists any
    pub async fn list_versions(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> RegistryResult<Option<(SourceOrigin, Vec<Version>)>> {
        self.first_matching(id, |_| true, cancel).await
    }

    /// Versions of `id` accepted by `filter`, from the first source listing at least one
    pub async fn first_matching<F>(
        &self,
        id: &str,
        filter: F,
        cancel: &CancellationToken,
    ) -> RegistryResult<Option<(SourceOrigin, Vec<Version>)>>
    where
        F: Fn(&Version) -> bool,
    {
        let mut failure = None;
        let mut answered = false;

        for source in &self.sources {
            match cancellable(cancel, source.list_versions(id)).await {
                Ok(versions) => {
                    answered = true;
                    let matching: Vec<Version> = versions.into_iter().filter(|v| filter(v)).collect();
                    if !matching.is_empty() {
                        debug!("{} lists {} matching versions of {}", source.origin(), matching.len(), id);
                        return Ok(Some((source.origin().clone(), matching)));
                    }
                },
                Err(NuloadError::Cancelled) => return Err(NuloadError::Cancelled),
                Err(e) => {
                    warn!("Source {} failed to list {}: {}", source.origin(), id, e);
                    failure = Some(e);
                },
            }
        }

        Self::settle(answered, failure)
    }

    /// Every version of `id` listed by any source, ascending and deduplicated
    pub async fn all_versions(&self, id: &str, cancel: &CancellationToken) -> RegistryResult<Vec<Version>> {
        let mut failure = None;
        let mut answered = false;
        let mut versions = Vec::new();

        for source in &self.sources {
            match cancellable(cancel, source.list_versions(id)).await {
                Ok(listed) => {
                    answered = true;
                    versions.extend(listed);
                },
                Err(NuloadError::Cancelled) => return Err(NuloadError::Cancelled),
                Err(e) => {
                    warn!("Source {} failed to list {}: {}", source.origin(), id, e);
                    failure = Some(e);
                },
            }
        }

        if let Some(e) = failure.filter(|_| !answered) {
            return Err(e);
        }

        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    /// Dependency information from the first source that has `identity`
    pub async fn dependency_info(
        &self,
        identity: &PackageIdentity,
        framework: &TargetFramework,
        cancel: &CancellationToken,
    ) -> RegistryResult<Option<(SourceOrigin, DependencyInfo)>> {
        let mut failure = None;
        let mut answered = false;

        for source in &self.sources {
            match cancellable(cancel, source.dependency_info(identity, framework)).await {
                Ok(Some(info)) => return Ok(Some((source.origin().clone(), info))),
                Ok(None) => answered = true,
                Err(NuloadError::Cancelled) => return Err(NuloadError::Cancelled),
                Err(e) => {
                    warn!("Source {} failed to describe {}: {}", source.origin(), identity, e);
                    failure = Some(e);
                },
            }
        }

        Self::settle(answered, failure)
    }

    /// Download an artifact from the source that served it
    pub async fn download(
        &self,
        origin: &SourceOrigin,
        identity: &PackageIdentity,
        content: &ContentDescriptor,
        cancel: &CancellationToken,
    ) -> RegistryResult<Vec<u8>> {
        let source = self
            .sources
            .iter()
            .find(|s| s.origin().location == origin.location)
            .ok_or_else(|| NuloadError::ConfigValidation {
                field: "source".to_string(),
                reason: format!("'{}' ({}) is not configured", origin.name, origin.location),
            })?;

        cancellable(cancel, source.download(identity, content)).await
    }

    /// "Not found" if any source answered cleanly, otherwise the last failure
    fn settle<T>(answered: bool, failure: Option<NuloadError>) -> RegistryResult<Option<T>> {
        match failure {
            Some(e) if !answered => Err(e),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{FeedPackage, LocalFeed};
    use async_trait::async_trait;

    struct BrokenSource {
        origin: SourceOrigin,
    }

    #[async_trait]
    impl PackageSource for BrokenSource {
        fn origin(&self) -> &SourceOrigin {
            &self.origin
        }

        async fn list_versions(&self, _id: &str) -> RegistryResult<Vec<Version>> {
            Err(NuloadError::Network {
                message: "connection refused".to_string(),
                source: None,
            })
        }

        async fn dependency_info(
            &self,
            _identity: &PackageIdentity,
            _framework: &TargetFramework,
        ) -> RegistryResult<Option<DependencyInfo>> {
            Err(NuloadError::Network {
                message: "connection refused".to_string(),
                source: None,
            })
        }

        async fn download(
            &self,
            _identity: &PackageIdentity,
            _content: &ContentDescriptor,
        ) -> RegistryResult<Vec<u8>> {
            Err(NuloadError::Network {
                message: "connection refused".to_string(),
                source: None,
            })
        }
    }

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn broken() -> Arc<dyn PackageSource> {
        Arc::new(BrokenSource {
            origin: SourceOrigin::new("broken", "https://broken.test/v3/index.json"),
        })
    }

    #[tokio::test]
    async fn test_first_source_wins() {
        let first = LocalFeed::new("first").with_package(FeedPackage::new("Foo", v("1.0.0")));
        let second = LocalFeed::new("second")
            .with_package(FeedPackage::new("Foo", v("2.0.0")))
            .with_package(FeedPackage::new("Bar", v("1.0.0")));
        let set = SourceSet::new(vec![Arc::new(first), Arc::new(second)]);
        let cancel = CancellationToken::new();

        let (origin, versions) = set.list_versions("Foo", &cancel).await.unwrap().unwrap();
        assert_eq!(origin.name, "first");
        assert_eq!(versions, vec![v("1.0.0")]);

        let (origin, _) = set.list_versions("Bar", &cancel).await.unwrap().unwrap();
        assert_eq!(origin.name, "second");

        let (origin, _) = set
            .first_matching("Foo", |version| version.major >= 2, &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(origin.name, "second");

        assert!(set.list_versions("Missing", &cancel).await.unwrap().is_none());

        let merged = set.all_versions("foo", &cancel).await.unwrap();
        assert_eq!(merged, vec![v("1.0.0"), v("2.0.0")]);
    }

    #[tokio::test]
    async fn test_failing_source_is_skipped() {
        let healthy = LocalFeed::new("healthy").with_package(FeedPackage::new("Foo", v("1.0.0")));
        let set = SourceSet::new(vec![broken(), Arc::new(healthy)]);
        let cancel = CancellationToken::new();

        let (origin, _) = set.list_versions("Foo", &cancel).await.unwrap().unwrap();
        assert_eq!(origin.name, "healthy");

        let info = set
            .dependency_info(&PackageIdentity::new("Foo", v("1.0.0")), &TargetFramework::default(), &cancel)
            .await
            .unwrap();
        assert!(info.is_some());

        // A clean "not found" from one source outranks another source's failure
        assert!(set.list_versions("Missing", &cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_sources_failing_reports_error() {
        let set = SourceSet::new(vec![broken()]);
        let cancel = CancellationToken::new();

        let err = set.list_versions("Foo", &cancel).await.unwrap_err();
        assert!(matches!(err, NuloadError::Network { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_lookup() {
        let set = SourceSet::new(vec![Arc::new(LocalFeed::new("feed"))]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = set.list_versions("Foo", &cancel).await.unwrap_err();
        assert!(matches!(err, NuloadError::Cancelled));
    }

    #[tokio::test]
    async fn test_download_from_unknown_origin() {
        let set = SourceSet::new(vec![Arc::new(LocalFeed::new("feed"))]);
        let content = ContentDescriptor {
            url: "memory://feed/Foo.1.0.0.nupkg".to_string(),
            sha512: None,
        };

        let err = set
            .download(
                &SourceOrigin::new("other", "memory://other"),
                &PackageIdentity::new("Foo", v("1.0.0")),
                &content,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NuloadError::ConfigValidation { .. }));
    }
}
