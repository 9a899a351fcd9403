//! Package requests, identities and registry candidates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use super::dependency::DependencyEdge;
use super::version::{Version, VersionRange};
use crate::error::{NuloadError, NuloadResult};

/// Maximum package id length accepted by NuGet
const MAX_ID_LENGTH: usize = 100;

/// Lowercase form used for id comparison and registry URLs
pub fn normalize_id(id: &str) -> String {
    id.to_ascii_lowercase()
}

/// Check if a package id is well formed
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LENGTH
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        && !id.starts_with('.')
        && !id.ends_with('.')
        && !id.contains("..")
}

/// A package the user asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequest {
    pub id: String,
    pub version_range: Option<VersionRange>,
    pub allow_prerelease: bool,
}

impl PackageRequest {
    /// Build a request, validating the id and parsing the range
    pub fn parse(id: &str, range: Option<&str>, allow_prerelease: bool) -> NuloadResult<Self> {
        let id = id.trim();
        if !is_valid_id(id) {
            return Err(NuloadError::InvalidConstraint {
                input: id.to_string(),
                reason: "package ids may only contain letters, digits, '.', '_' and '-'"
                    .to_string(),
            });
        }

        let version_range = match range.map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => Some(VersionRange::parse(raw).map_err(|e| {
                NuloadError::InvalidConstraint {
                    input: raw.to_string(),
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            id: id.to_string(),
            version_range,
            allow_prerelease,
        })
    }

    /// Check if a listed version can serve this request
    pub fn accepts(&self, version: &Version) -> bool {
        if version.is_prerelease()
            && !self.allow_prerelease
            && !self
                .version_range
                .as_ref()
                .map_or(false, VersionRange::allows_prerelease)
        {
            return false;
        }

        self.version_range
            .as_ref()
            .map_or(true, |range| range.satisfies(version))
    }

    /// Range text for diagnostics
    pub fn range_display(&self) -> String {
        self.version_range
            .as_ref()
            .map_or_else(|| "latest".to_string(), ToString::to_string)
    }
}

/// A concrete `(id, version)` pair; ids compare case-insensitively
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub id: String,
    pub version: Version,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Directory name inside the target root (`<id>.<version>`)
    pub fn dir_name(&self) -> String {
        format!("{}.{}", self.id, self.version.normalized())
    }

    /// Check if this identity has the given id
    pub fn has_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id.eq_ignore_ascii_case(&other.id) && self.version == other.version
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        normalize_id(&self.id).hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.version)
    }
}

/// Which configured source served a candidate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceOrigin {
    pub name: String,
    /// Service index URL or feed directory
    pub location: String,
}

impl SourceOrigin {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Where to fetch a package artifact from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub url: String,
    /// Base64 SHA-512 of the artifact, when the registry reports one
    #[serde(default)]
    pub sha512: Option<String>,
}

/// A package version discovered during gathering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePackage {
    pub identity: PackageIdentity,
    pub dependencies: Vec<DependencyEdge>,
    pub origin: SourceOrigin,
    pub content: Option<ContentDescriptor>,
}

impl CandidatePackage {
    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn version(&self) -> &Version {
        &self.identity.version
    }
}

/// Which satisfying version to prefer when several are allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyBehavior {
    #[default]
    Lowest,
    Highest,
}

impl FromStr for DependencyBehavior {
    type Err = NuloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lowest" => Ok(Self::Lowest),
            "highest" => Ok(Self::Highest),
            other => Err(NuloadError::ConfigValidation {
                field: "dependency-behavior".to_string(),
                reason: format!("expected 'lowest' or 'highest', got '{}'", other),
            }),
        }
    }
}

impl fmt::Display for DependencyBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lowest => write!(f, "lowest"),
            Self::Highest => write!(f, "highest"),
        }
    }
}
