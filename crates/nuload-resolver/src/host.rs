//! Host-environment filter.
//!
//! Decides whether a dependency is already supplied by the process that will
//! load the packages, so it is neither gathered nor installed.

use std::collections::{HashMap, HashSet};

use nuload_core::types::normalize_id;
use nuload_core::{DependencyEdge, Version, VersionRange};

/// Packages that ship as part of the .NET runtime itself
pub const DEFAULT_RUNTIME_PROVIDED: &[&str] = &[
    "Microsoft.NETCore.App",
    "Microsoft.NETCore.Platforms",
    "Microsoft.NETCore.Targets",
    "Microsoft.AspNetCore.App",
    "Microsoft.WindowsDesktop.App",
    "NETStandard.Library",
];

/// What the hosting process already provides
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    runtime_provided: HashSet<String>,
    /// Lowercase id -> declared version text
    libraries: HashMap<String, String>,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEnvironment {
    /// Host with the default runtime-provided list and no libraries
    pub fn new() -> Self {
        let mut host = Self::empty();
        for id in DEFAULT_RUNTIME_PROVIDED {
            host.add_runtime_provided(id);
        }
        host
    }

    /// Host that supplies nothing
    pub fn empty() -> Self {
        Self {
            runtime_provided: HashSet::new(),
            libraries: HashMap::new(),
        }
    }

    pub fn add_runtime_provided(&mut self, id: &str) {
        self.runtime_provided.insert(normalize_id(id));
    }

    pub fn add_library(&mut self, id: &str, version: impl Into<String>) {
        self.libraries.insert(normalize_id(id), version.into());
    }

    pub fn with_runtime_provided(mut self, id: &str) -> Self {
        self.add_runtime_provided(id);
        self
    }

    pub fn with_library(mut self, id: &str, version: impl Into<String>) -> Self {
        self.add_library(id, version);
        self
    }

    pub fn library_count(&self) -> usize {
        self.libraries.len()
    }

    /// Check if the host already supplies a dependency on `id` within `range`
    ///
    /// A prerelease host library counts as supplying the dependency whatever
    /// the range says.
    pub fn is_supplied_by_host(&self, id: &str, range: &VersionRange) -> bool {
        let key = normalize_id(id);

        if self.runtime_provided.contains(&key) {
            return true;
        }

        let Some(declared) = self.libraries.get(&key) else {
            return false;
        };

        match declared.parse::<Version>() {
            Ok(version) => version.is_prerelease() || range.satisfies(&version),
            Err(_) => false,
        }
    }

    /// Drop the edges the host supplies
    pub fn filter_edges(&self, edges: Vec<DependencyEdge>) -> Vec<DependencyEdge> {
        edges
            .into_iter()
            .filter(|edge| !self.is_supplied_by_host(&edge.id, &edge.range))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    #[test]
    fn test_runtime_provided_any_range() {
        let host = HostEnvironment::new();
        assert!(host.is_supplied_by_host("NETStandard.Library", &range(">99.0.0")));
        assert!(host.is_supplied_by_host("netstandard.library", &VersionRange::all()));
        assert!(!host.is_supplied_by_host("Serilog", &VersionRange::all()));
    }

    #[test]
    fn test_host_library_version_check() {
        let host = HostEnvironment::empty().with_library("Newtonsoft.Json", "13.0.1");

        assert!(host.is_supplied_by_host("newtonsoft.json", &range("[12.0,14.0)")));
        assert!(!host.is_supplied_by_host("Newtonsoft.Json", &range("[13.0.2,)")));
    }

    #[test]
    fn test_prerelease_host_library_always_supplies() {
        let host = HostEnvironment::empty().with_library("Foo", "2.0.0-preview.1");
        assert!(host.is_supplied_by_host("Foo", &range("[5.0,6.0)")));
    }

    #[test]
    fn test_unparseable_host_version() {
        let host = HostEnvironment::empty().with_library("Foo", "not.a.version");
        assert!(!host.is_supplied_by_host("Foo", &VersionRange::all()));
    }

    #[test]
    fn test_filter_edges() {
        let host = HostEnvironment::new().with_library("Shared", "1.0.0");
        let edges = vec![
            DependencyEdge::new("NETStandard.Library", range("1.6.1")),
            DependencyEdge::new("Shared", range("[1.0,2.0)")),
            DependencyEdge::new("Shared.Extra", range("1.0")),
        ];

        let remaining = host.filter_edges(edges);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "Shared.Extra");
    }
}
