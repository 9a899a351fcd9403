//! The output of version resolution.

use serde::{Deserialize, Serialize};

use super::package::{CandidatePackage, PackageIdentity};

/// One selected candidate per package id, dependencies first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSet {
    packages: Vec<CandidatePackage>,
}

impl ResolvedSet {
    pub fn new(packages: Vec<CandidatePackage>) -> Self {
        Self { packages }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidatePackage> {
        self.packages.iter()
    }

    /// Look up the selected candidate for an id (case-insensitive)
    pub fn get(&self, id: &str) -> Option<&CandidatePackage> {
        self.packages.iter().find(|p| p.identity.has_id(id))
    }

    pub fn identities(&self) -> Vec<PackageIdentity> {
        self.packages.iter().map(|p| p.identity.clone()).collect()
    }

    pub fn into_packages(self) -> Vec<CandidatePackage> {
        self.packages
    }
}

impl<'a> IntoIterator for &'a ResolvedSet {
    type Item = &'a CandidatePackage;
    type IntoIter = std::slice::Iter<'a, CandidatePackage>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.iter()
    }
}
