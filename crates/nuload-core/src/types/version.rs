//! NuGet-style semantic versions and version ranges.
//!
//! `Version` accepts one to four numeric components plus optional prerelease
//! and build metadata. `VersionRange` is a single interval and can be written
//! either in NuGet interval notation (`[1.0,2.0)`) or as comparators
//! (`>=1.0 <2.0`, `^1.2`, `~1.2.3`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Semantic version (major.minor.patch[.revision]-prerelease+build)
#[derive(Debug, Clone)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub revision: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

/// One end of a version interval
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// Version interval (`[1.0,2.0)`, `>=1.0`, `*`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VersionRange {
    pub min: Option<Bound>,
    pub max: Option<Bound>,
}

/// Version parsing and validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version format: {input}")]
    InvalidFormat { input: String },

    #[error("Invalid number in version: {component}")]
    InvalidNumber { component: String },

    #[error("Invalid prerelease identifier: {prerelease}")]
    InvalidPrerelease { prerelease: String },

    #[error("Invalid build metadata: {build}")]
    InvalidBuild { build: String },

    #[error("Invalid range syntax: {input}")]
    InvalidRange { input: String },

    #[error("Range {input} cannot be satisfied by any version")]
    EmptyRange { input: String },
}

impl Version {
    /// Create a new release version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: 0,
            prerelease: None,
            build: None,
        }
    }

    /// Attach a prerelease label
    pub fn with_prerelease(mut self, prerelease: &str) -> Self {
        self.prerelease = Some(prerelease.to_string());
        self
    }

    /// Check if this version satisfies a version range
    pub fn satisfies(&self, range: &VersionRange) -> bool {
        range.satisfies(self)
    }

    /// Display form without build metadata, as used in package folder names
    pub fn normalized(&self) -> String {
        Version {
            build: None,
            ..self.clone()
        }
        .to_string()
    }

    /// Check if this is a prerelease version
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// Get the precedence for comparison (ignores build metadata)
    fn precedence_cmp(&self, other: &Self) -> Ordering {
        let core = (self.major, self.minor, self.patch, self.revision).cmp(&(
            other.major,
            other.minor,
            other.patch,
            other.revision,
        ));
        match core {
            Ordering::Equal => match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            },
            other => other,
        }
    }
}

/// Compare dot-separated prerelease labels identifier by identifier
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase()),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            },
        }
    }
}

fn valid_identifiers(label: &str) -> bool {
    !label.is_empty()
        && label
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();

        // Split on '+' for build metadata
        let (version_part, build) = match input.split_once('+') {
            Some((v, b)) => {
                if !valid_identifiers(b) {
                    return Err(VersionError::InvalidBuild {
                        build: b.to_string(),
                    });
                }
                (v, Some(b.to_string()))
            },
            None => (input, None),
        };

        // Split on the first '-' for prerelease
        let (core_part, prerelease) = match version_part.split_once('-') {
            Some((c, p)) => {
                if !valid_identifiers(p) {
                    return Err(VersionError::InvalidPrerelease {
                        prerelease: p.to_string(),
                    });
                }
                (c, Some(p.to_string()))
            },
            None => (version_part, None),
        };

        let parts: Vec<&str> = core_part.split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(VersionError::InvalidFormat {
                input: input.to_string(),
            });
        }

        let mut numbers = [0u64; 4];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(VersionError::InvalidNumber {
                    component: part.to_string(),
                });
            }
            *slot = part.parse().map_err(|_| VersionError::InvalidNumber {
                component: part.to_string(),
            })?;
        }

        Ok(Version {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            revision: numbers[3],
            prerelease,
            build,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;

        if self.revision > 0 {
            write!(f, ".{}", self.revision)?;
        }

        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }

        if let Some(ref build) = self.build {
            write!(f, "+{}", build)?;
        }

        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.precedence_cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.major, self.minor, self.patch, self.revision).hash(state);
        // Must agree with compare_prerelease: `beta.01` equals `beta.1`
        if let Some(pre) = &self.prerelease {
            for part in pre.split('.') {
                match part.parse::<u64>() {
                    Ok(n) => (0u8, n).hash(state),
                    Err(_) => (1u8, part.to_ascii_lowercase()).hash(state),
                }
            }
        }
        self.prerelease.is_some().hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.precedence_cmp(other)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Bound {
    fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

impl VersionRange {
    /// Range matching every version
    pub fn all() -> Self {
        Self::default()
    }

    /// Range matching exactly one version
    pub fn exact(version: Version) -> Self {
        Self {
            min: Some(Bound::inclusive(version.clone())),
            max: Some(Bound::inclusive(version)),
        }
    }

    /// Range matching `version` and everything above it
    pub fn at_least(version: Version) -> Self {
        Self {
            min: Some(Bound::inclusive(version)),
            max: None,
        }
    }

    /// Parse a range string
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return Err(VersionError::InvalidRange {
                input: input.to_string(),
            });
        }

        let range = if trimmed == "*" {
            Self::all()
        } else if trimmed.starts_with('[') || trimmed.starts_with('(') {
            Self::parse_interval(trimmed)?
        } else if trimmed.starts_with(['>', '<', '=', '^', '~']) {
            Self::parse_comparators(trimmed)?
        } else {
            Self::at_least(Version::from_str(trimmed)?)
        };

        if range.is_empty() {
            return Err(VersionError::EmptyRange {
                input: input.to_string(),
            });
        }

        Ok(range)
    }

    fn parse_interval(input: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidRange {
            input: input.to_string(),
        };

        let min_inclusive = input.starts_with('[');
        let max_inclusive = input.ends_with(']');
        if !max_inclusive && !input.ends_with(')') {
            return Err(invalid());
        }
        if input.len() < 2 {
            return Err(invalid());
        }

        let inner = input[1..input.len() - 1].trim();
        match inner.split_once(',') {
            None => {
                // Exact match: only [1.0] is meaningful
                if !min_inclusive || !max_inclusive || inner.is_empty() {
                    return Err(invalid());
                }
                Ok(Self::exact(Version::from_str(inner)?))
            },
            Some((low, high)) => {
                let (low, high) = (low.trim(), high.trim());
                if high.contains(',') {
                    return Err(invalid());
                }
                let min = if low.is_empty() {
                    None
                } else {
                    Some(Bound {
                        version: Version::from_str(low)?,
                        inclusive: min_inclusive,
                    })
                };
                let max = if high.is_empty() {
                    None
                } else {
                    Some(Bound {
                        version: Version::from_str(high)?,
                        inclusive: max_inclusive,
                    })
                };
                Ok(Self { min, max })
            },
        }
    }

    fn parse_comparators(input: &str) -> Result<Self, VersionError> {
        let mut range = Self::all();

        for token in input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let part = if token == "*" {
                Self::all()
            } else if let Some(v) = token.strip_prefix(">=") {
                Self::at_least(Version::from_str(v)?)
            } else if let Some(v) = token.strip_prefix("<=") {
                Self {
                    min: None,
                    max: Some(Bound::inclusive(Version::from_str(v)?)),
                }
            } else if let Some(v) = token.strip_prefix('>') {
                Self {
                    min: Some(Bound::exclusive(Version::from_str(v)?)),
                    max: None,
                }
            } else if let Some(v) = token.strip_prefix('<') {
                Self {
                    min: None,
                    max: Some(Bound::exclusive(Version::from_str(v)?)),
                }
            } else if let Some(v) = token.strip_prefix('=') {
                Self::exact(Version::from_str(v)?)
            } else if let Some(v) = token.strip_prefix('^') {
                Self::caret(Version::from_str(v)?, token)?
            } else if let Some(v) = token.strip_prefix('~') {
                Self::tilde(Version::from_str(v)?, token)?
            } else {
                Self::exact(Version::from_str(token)?)
            };
            range = range.intersect(&part);
        }

        Ok(range)
    }

    /// `^1.2.3` allows >=1.2.3 <2.0.0 (left-most non-zero component is fixed)
    fn caret(version: Version, input: &str) -> Result<Self, VersionError> {
        let overflow = || VersionError::InvalidRange {
            input: input.to_string(),
        };
        let upper = if version.major > 0 {
            Version::new(version.major.checked_add(1).ok_or_else(overflow)?, 0, 0)
        } else if version.minor > 0 {
            Version::new(0, version.minor.checked_add(1).ok_or_else(overflow)?, 0)
        } else {
            Version::new(0, 0, version.patch.checked_add(1).ok_or_else(overflow)?)
        };
        Ok(Self {
            min: Some(Bound::inclusive(version)),
            max: Some(Bound::exclusive(upper)),
        })
    }

    /// `~1.2.3` allows >=1.2.3 <1.3.0
    fn tilde(version: Version, input: &str) -> Result<Self, VersionError> {
        let minor = version.minor.checked_add(1).ok_or_else(|| VersionError::InvalidRange {
            input: input.to_string(),
        })?;
        let upper = Version::new(version.major, minor, 0);
        Ok(Self {
            min: Some(Bound::inclusive(version)),
            max: Some(Bound::exclusive(upper)),
        })
    }

    /// Check if a version lies inside this interval
    pub fn satisfies(&self, version: &Version) -> bool {
        let above_min = match &self.min {
            None => true,
            Some(b) if b.inclusive => version >= &b.version,
            Some(b) => version > &b.version,
        };
        let below_max = match &self.max {
            None => true,
            Some(b) if b.inclusive => version <= &b.version,
            Some(b) => version < &b.version,
        };
        above_min && below_max
    }

    /// Lower bound version, if the range has one
    pub fn min_version(&self) -> Option<&Version> {
        self.min.as_ref().map(|b| &b.version)
    }

    /// Upper bound version, if the range has one
    pub fn max_version(&self) -> Option<&Version> {
        self.max.as_ref().map(|b| &b.version)
    }

    /// Prerelease versions are only picked implicitly when a bound names one
    pub fn allows_prerelease(&self) -> bool {
        self.min.as_ref().map_or(false, |b| b.version.is_prerelease())
            || self.max.as_ref().map_or(false, |b| b.version.is_prerelease())
    }

    /// Check if the range is unbounded on both sides
    pub fn is_all(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Check if no version can satisfy the range
    pub fn is_empty(&self) -> bool {
        match (&self.min, &self.max) {
            (Some(low), Some(high)) => match low.version.cmp(&high.version) {
                Ordering::Greater => true,
                Ordering::Equal => !(low.inclusive && high.inclusive),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    /// Intersection of two ranges (may be empty)
    pub fn intersect(&self, other: &VersionRange) -> VersionRange {
        let min = match (&self.min, &other.min) {
            (None, b) | (b, None) => b.clone(),
            (Some(a), Some(b)) => Some(match a.version.cmp(&b.version) {
                Ordering::Greater => a.clone(),
                Ordering::Less => b.clone(),
                Ordering::Equal => Bound {
                    version: a.version.clone(),
                    inclusive: a.inclusive && b.inclusive,
                },
            }),
        };
        let max = match (&self.max, &other.max) {
            (None, b) | (b, None) => b.clone(),
            (Some(a), Some(b)) => Some(match a.version.cmp(&b.version) {
                Ordering::Less => a.clone(),
                Ordering::Greater => b.clone(),
                Ordering::Equal => Bound {
                    version: a.version.clone(),
                    inclusive: a.inclusive && b.inclusive,
                },
            }),
        };
        VersionRange { min, max }
    }

    /// Lowest of `versions` inside the range, skipping prereleases unless allowed
    pub fn lowest_match<'a, I>(&self, versions: I, include_prerelease: bool) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        versions
            .into_iter()
            .filter(|v| self.satisfies(v))
            .filter(|v| include_prerelease || !v.is_prerelease())
            .min()
    }

    /// Highest of `versions` inside the range, skipping prereleases unless allowed
    pub fn highest_match<'a, I>(&self, versions: I, include_prerelease: bool) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        versions
            .into_iter()
            .filter(|v| self.satisfies(v))
            .filter(|v| include_prerelease || !v.is_prerelease())
            .max()
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.min, &self.max) {
            (None, None) => write!(f, "*"),
            (Some(low), Some(high)) if low.version == high.version && low.inclusive && high.inclusive => {
                write!(f, "[{}]", low.version)
            },
            (min, max) => {
                match min {
                    Some(b) => write!(f, "{}{}", if b.inclusive { '[' } else { '(' }, b.version)?,
                    None => write!(f, "(")?,
                }
                write!(f, ", ")?;
                match max {
                    Some(b) => write!(f, "{}{}", b.version, if b.inclusive { ']' } else { ')' }),
                    None => write!(f, ")"),
                }
            },
        }
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        VersionRange::parse(&raw).map_err(serde::de::Error::custom)
    }
}
