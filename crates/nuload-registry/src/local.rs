//! Directory-backed package feed.
//!
//! A feed directory holds a `feed.json` index next to the package artifacts:
//!
//! ```json
//! {
//!   "packages": [
//!     {
//!       "id": "Foo",
//!       "version": "1.0.0",
//!       "file": "Foo.1.0.0.nupkg",
//!       "dependencyGroups": [
//!         { "targetFramework": "netstandard2.0",
//!           "dependencies": [ { "id": "Bar", "range": "[1.0.0, )" } ] }
//!       ]
//!     }
//!   ]
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use nuload_core::error::NuloadError;
use nuload_core::types::select_group;
use nuload_core::{
    ContentDescriptor, DependencyEdge, DependencyGroup, PackageIdentity, SourceOrigin, TargetFramework,
    Version, VersionRange,
};

use crate::source::{DependencyInfo, PackageSource};
use crate::RegistryResult;

/// Name of the index file inside a feed directory
pub const FEED_INDEX: &str = "feed.json";

/// One package version listed by a feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPackage {
    pub id: String,
    pub version: Version,
    #[serde(default)]
    pub dependency_groups: Vec<DependencyGroup>,
    /// Artifact file name relative to the feed directory
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub sha512: Option<String>,
}

impl FeedPackage {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
            dependency_groups: Vec::new(),
            file: None,
            sha512: None,
        }
    }

    /// Add a dependency to the framework-neutral group
    pub fn depends_on(mut self, id: impl Into<String>, range: VersionRange) -> Self {
        let edge = DependencyEdge::new(id, range);
        match self
            .dependency_groups
            .iter_mut()
            .find(|g| g.target_framework.is_none())
        {
            Some(group) => group.dependencies.push(edge),
            None => self.dependency_groups.push(DependencyGroup {
                target_framework: None,
                dependencies: vec![edge],
            }),
        }
        self
    }

    /// Add a dependency group for one framework
    pub fn with_group(mut self, group: DependencyGroup) -> Self {
        self.dependency_groups.push(group);
        self
    }

    fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.id.clone(), self.version.clone())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FeedIndex {
    #[serde(default)]
    packages: Vec<FeedPackage>,
}

/// A package source backed by a directory or by memory
#[derive(Debug)]
pub struct LocalFeed {
    origin: SourceOrigin,
    root: Option<PathBuf>,
    packages: Vec<FeedPackage>,
    /// In-memory artifacts keyed by content url
    artifacts: HashMap<String, Vec<u8>>,
}

impl LocalFeed {
    /// An empty in-memory feed
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            origin: SourceOrigin::new(name.clone(), format!("memory://{}", name)),
            root: None,
            packages: Vec::new(),
            artifacts: HashMap::new(),
        }
    }

    /// Open a feed directory and read its index
    pub fn open(name: impl Into<String>, root: impl AsRef<Path>) -> RegistryResult<Self> {
        let root = root.as_ref().to_path_buf();
        let index_path = root.join(FEED_INDEX);

        let raw = std::fs::read_to_string(&index_path).map_err(|e| {
            NuloadError::io(format!("Failed to read feed index {}", index_path.display()), e)
        })?;
        let index: FeedIndex = serde_json::from_str(&raw).map_err(|e| NuloadError::ConfigParse {
            file: index_path.display().to_string(),
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        })?;

        debug!("Opened feed {} with {} packages", root.display(), index.packages.len());

        Ok(Self {
            origin: SourceOrigin::new(name, root.display().to_string()),
            root: Some(root),
            packages: index.packages,
            artifacts: HashMap::new(),
        })
    }

    /// List a package version
    pub fn add(&mut self, package: FeedPackage) {
        self.packages.push(package);
    }

    /// List a package version together with its artifact bytes
    pub fn add_with_artifact(&mut self, mut package: FeedPackage, artifact: Vec<u8>) {
        let url = format!("{}/{}.nupkg", self.origin.location, package.identity().dir_name());
        package.file = Some(url.clone());
        self.artifacts.insert(url, artifact);
        self.packages.push(package);
    }

    /// Builder form of [`LocalFeed::add`]
    pub fn with_package(mut self, package: FeedPackage) -> Self {
        self.add(package);
        self
    }

    /// Write the current index to `<root>/feed.json`
    pub fn save(&self) -> RegistryResult<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };

        let index = FeedIndex {
            packages: self.packages.clone(),
        };
        let json = serde_json::to_string_pretty(&index).map_err(|e| NuloadError::ConfigValidation {
            field: FEED_INDEX.to_string(),
            reason: e.to_string(),
        })?;

        let path = root.join(FEED_INDEX);
        std::fs::write(&path, json)
            .map_err(|e| NuloadError::io(format!("Failed to write {}", path.display()), e))
    }

    fn find(&self, identity: &PackageIdentity) -> Option<&FeedPackage> {
        self.packages
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(&identity.id) && p.version == identity.version)
    }
}

#[async_trait]
impl PackageSource for LocalFeed {
    fn origin(&self) -> &SourceOrigin {
        &self.origin
    }

    async fn list_versions(&self, id: &str) -> RegistryResult<Vec<Version>> {
        Ok(self
            .packages
            .iter()
            .filter(|p| p.id.eq_ignore_ascii_case(id))
            .map(|p| p.version.clone())
            .collect())
    }

    async fn dependency_info(
        &self,
        identity: &PackageIdentity,
        framework: &TargetFramework,
    ) -> RegistryResult<Option<DependencyInfo>> {
        Ok(self.find(identity).map(|package| DependencyInfo {
            identity: package.identity(),
            dependencies: select_group(&package.dependency_groups, framework),
            content: package.file.as_ref().map(|file| ContentDescriptor {
                url: file.clone(),
                sha512: package.sha512.clone(),
            }),
        }))
    }

    async fn download(
        &self,
        identity: &PackageIdentity,
        content: &ContentDescriptor,
    ) -> RegistryResult<Vec<u8>> {
        if let Some(bytes) = self.artifacts.get(&content.url) {
            return Ok(bytes.clone());
        }

        let Some(root) = &self.root else {
            return Err(NuloadError::PackageNotFound {
                id: identity.id.clone(),
                range: format!("[{}]", identity.version),
            });
        };

        let path = nuload_core::utils::safe_join(root, Path::new(&content.url))?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NuloadError::PackageNotFound {
                    id: identity.id.clone(),
                    range: format!("[{}]", identity.version),
                }
            } else {
                NuloadError::io(format!("Failed to read {}", path.display()), e)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_feed() {
        let feed = LocalFeed::new("memory")
            .with_package(FeedPackage::new("A", v("1.0.0")).depends_on("B", VersionRange::parse("[1.0,2.0)").unwrap()))
            .with_package(FeedPackage::new("A", v("1.5.0")))
            .with_package(FeedPackage::new("B", v("1.0.0")));

        let mut versions = feed.list_versions("a").await.unwrap();
        versions.sort();
        assert_eq!(versions, vec![v("1.0.0"), v("1.5.0")]);
        assert!(feed.list_versions("Z").await.unwrap().is_empty());

        let info = feed
            .dependency_info(&PackageIdentity::new("A", v("1.0.0")), &TargetFramework::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.dependencies.len(), 1);
        assert_eq!(info.dependencies[0].id, "B");
        assert!(info.content.is_none());
    }

    #[tokio::test]
    async fn test_in_memory_artifacts() {
        let mut feed = LocalFeed::new("memory");
        feed.add_with_artifact(FeedPackage::new("Foo", v("1.0.0")), b"zip bytes".to_vec());

        let identity = PackageIdentity::new("Foo", v("1.0.0"));
        let info = feed
            .dependency_info(&identity, &TargetFramework::default())
            .await
            .unwrap()
            .unwrap();
        let content = info.content.unwrap();

        assert_eq!(feed.download(&identity, &content).await.unwrap(), b"zip bytes");
    }

    #[tokio::test]
    async fn test_directory_feed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Foo.1.0.0.nupkg"), b"artifact").unwrap();

        std::fs::write(
            dir.path().join(FEED_INDEX),
            serde_json::json!({
                "packages": [{
                    "id": "Foo",
                    "version": "1.0.0",
                    "file": "Foo.1.0.0.nupkg",
                    "dependencyGroups": [{
                        "targetFramework": "netstandard2.0",
                        "dependencies": [ { "id": "Bar", "range": "[1.0.0, )" } ]
                    }]
                }]
            })
            .to_string(),
        )
        .unwrap();

        let feed = LocalFeed::open("offline", dir.path()).unwrap();
        let identity = PackageIdentity::new("foo", v("1.0.0"));
        let info = feed
            .dependency_info(&identity, &"net5.0".parse().unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(info.identity.id, "Foo");
        assert_eq!(info.dependencies[0].id, "Bar");

        let bytes = feed.download(&identity, &info.content.unwrap()).await.unwrap();
        assert_eq!(bytes, b"artifact");

        feed.save().unwrap();
        let reopened = LocalFeed::open("offline", dir.path()).unwrap();
        assert_eq!(reopened.packages, feed.packages);
    }

    #[tokio::test]
    async fn test_directory_feed_rejects_escaping_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FEED_INDEX), r#"{ "packages": [] }"#).unwrap();
        let feed = LocalFeed::open("offline", dir.path()).unwrap();

        let content = ContentDescriptor {
            url: "../secret.nupkg".to_string(),
            sha512: None,
        };
        let result = feed.download(&PackageIdentity::new("X", v("1.0.0")), &content).await;
        assert!(matches!(result, Err(NuloadError::Archive { .. })));
    }

    #[test]
    fn test_open_reports_parse_position() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FEED_INDEX), "{\n  \"packages\": [\n    oops\n  ]\n}").unwrap();

        match LocalFeed::open("broken", dir.path()) {
            Err(NuloadError::ConfigParse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
