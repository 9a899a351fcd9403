//! NuGet v3 API response types

use serde::{Deserialize, Serialize};
use tracing::debug;

use nuload_core::{DependencyEdge, DependencyGroup, TargetFramework, VersionRange};

/// Service index (`/v3/index.json`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceIndex {
    pub version: String,
    pub resources: Vec<ServiceResource>,
}

/// One advertised resource
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceResource {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub resource_type: String,
}

impl ServiceIndex {
    /// URL of the first resource matching one of `types`, tried in order
    pub fn resource(&self, types: &[&str]) -> Option<&str> {
        types.iter().find_map(|wanted| {
            self.resources
                .iter()
                .find(|r| r.resource_type == *wanted)
                .map(|r| r.id.trim_end_matches('/'))
        })
    }
}

/// Flat container version listing (`{base}/{id}/index.json`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlatContainerIndex {
    pub versions: Vec<String>,
}

/// Registration index for one package id
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistrationIndex {
    #[serde(default)]
    pub count: usize,
    pub items: Vec<RegistrationPage>,
}

/// A page of registration leaves; large packages only link to their pages
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistrationPage {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(default)]
    pub items: Option<Vec<RegistrationLeaf>>,
    pub lower: Option<String>,
    pub upper: Option<String>,
}

/// One package version inside a registration page
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationLeaf {
    pub catalog_entry: CatalogEntry,
    pub package_content: Option<String>,
}

/// Catalog metadata for a package version
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub listed: Option<bool>,
    #[serde(default)]
    pub dependency_groups: Vec<RegistrationDependencyGroup>,
    pub package_hash: Option<String>,
    pub package_hash_algorithm: Option<String>,
}

/// Dependency group as published in registration metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDependencyGroup {
    pub target_framework: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<RegistrationDependency>,
}

/// Dependency as published in registration metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistrationDependency {
    pub id: String,
    pub range: Option<String>,
}

impl CatalogEntry {
    /// SHA-512 package hash, when the registry publishes one
    pub fn sha512(&self) -> Option<String> {
        let algorithm = self.package_hash_algorithm.as_deref().unwrap_or("SHA512");
        if algorithm.eq_ignore_ascii_case("SHA512") {
            self.package_hash.clone()
        } else {
            None
        }
    }

    /// Dependency groups with parsed frameworks and ranges
    ///
    /// Groups naming an unknown framework are dropped. A missing or malformed
    /// range is treated as "any version", as NuGet clients do.
    pub fn dependency_groups(&self) -> Vec<DependencyGroup> {
        self.dependency_groups
            .iter()
            .filter_map(|group| {
                let target_framework = match group.target_framework.as_deref().map(str::trim) {
                    None | Some("") => None,
                    Some(raw) => match raw.parse::<TargetFramework>() {
                        Ok(tfm) => Some(tfm),
                        Err(e) => {
                            debug!("Skipping dependency group for {} {}: {}", self.id, self.version, e);
                            return None;
                        },
                    },
                };

                let dependencies = group
                    .dependencies
                    .iter()
                    .map(|dep| {
                        let range = dep
                            .range
                            .as_deref()
                            .and_then(|raw| match VersionRange::parse(raw) {
                                Ok(range) => Some(range),
                                Err(e) => {
                                    debug!("Ignoring range '{}' on {} -> {}: {}", raw, self.id, dep.id, e);
                                    None
                                },
                            })
                            .unwrap_or_default();
                        DependencyEdge::new(dep.id.clone(), range)
                    })
                    .collect();

                Some(DependencyGroup {
                    target_framework,
                    dependencies,
                })
            })
            .collect()
    }
}
