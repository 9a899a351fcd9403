//! Target framework monikers and nearest-framework selection.
//!
//! Accepts the short folder form used inside packages (`net472`,
//! `netstandard2.0`, `net6.0-windows`) and the long form reported by
//! registries (`.NETStandard2.0`, `.NETFramework,Version=v4.7.2`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::version::VersionError;

/// Framework family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameworkFamily {
    /// .NET Framework (`net472`)
    NetFramework,
    /// .NET Core and .NET 5+ (`netcoreapp3.1`, `net5.0`)
    NetCoreApp,
    /// .NET Standard (`netstandard2.0`)
    NetStandard,
    /// Framework-neutral content (`any`)
    Any,
}

/// A parsed target framework moniker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetFramework {
    pub family: FrameworkFamily,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub platform: Option<String>,
}

impl TargetFramework {
    /// Create a framework without a platform suffix
    pub fn new(family: FrameworkFamily, major: u32, minor: u32) -> Self {
        Self {
            family,
            major,
            minor,
            patch: 0,
            platform: None,
        }
    }

    /// The framework-neutral moniker
    pub fn any() -> Self {
        Self::new(FrameworkFamily::Any, 0, 0)
    }

    fn version(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }

    /// Highest .NET Standard version this framework can consume
    fn netstandard_support(&self) -> Option<(u32, u32, u32)> {
        match self.family {
            FrameworkFamily::NetStandard => Some(self.version()),
            FrameworkFamily::NetCoreApp => Some(match self.major {
                0 | 1 => (1, 6, 0),
                2 => (2, 0, 0),
                _ => (2, 1, 0),
            }),
            FrameworkFamily::NetFramework => match self.version() {
                v if v >= (4, 6, 1) => Some((2, 0, 0)),
                v if v >= (4, 6, 0) => Some((1, 3, 0)),
                v if v >= (4, 5, 1) => Some((1, 2, 0)),
                v if v >= (4, 5, 0) => Some((1, 1, 0)),
                _ => None,
            },
            FrameworkFamily::Any => None,
        }
    }

    /// Check if assets built for `self` can be used by `host`
    pub fn is_compatible_with(&self, host: &TargetFramework) -> bool {
        if let Some(ref platform) = self.platform {
            let same_platform = host
                .platform
                .as_ref()
                .map_or(false, |p| p.eq_ignore_ascii_case(platform));
            if !same_platform {
                return false;
            }
        }

        match self.family {
            FrameworkFamily::Any => true,
            FrameworkFamily::NetStandard => host
                .netstandard_support()
                .map_or(false, |max| self.version() <= max),
            family => family == host.family && self.version() <= host.version(),
        }
    }

    /// Pick the most specific framework from `candidates` that `self` can consume
    pub fn nearest<'a, I>(&self, candidates: I) -> Option<&'a TargetFramework>
    where
        I: IntoIterator<Item = &'a TargetFramework>,
    {
        candidates
            .into_iter()
            .filter(|candidate| candidate.is_compatible_with(self))
            .max_by_key(|candidate| {
                let rank = if candidate.family == self.family {
                    3
                } else if candidate.family == FrameworkFamily::NetStandard {
                    2
                } else {
                    1
                };
                (rank, candidate.version(), candidate.platform.is_some())
            })
    }

    fn parse_numbers(digits: &str, input: &str) -> Result<(u32, u32, u32), VersionError> {
        let invalid = || VersionError::InvalidFormat {
            input: input.to_string(),
        };

        if digits.is_empty() {
            return Err(invalid());
        }

        let parts: Vec<u32> = if digits.contains('.') {
            digits
                .split('.')
                .map(|p| p.parse::<u32>().map_err(|_| invalid()))
                .collect::<Result<_, _>>()?
        } else {
            // Dotless form: one digit per component (net472 = 4.7.2)
            digits
                .chars()
                .map(|c| c.to_digit(10).ok_or_else(invalid))
                .collect::<Result<_, _>>()?
        };

        if parts.is_empty() || parts.len() > 4 {
            return Err(invalid());
        }

        Ok((
            parts[0],
            parts.get(1).copied().unwrap_or(0),
            parts.get(2).copied().unwrap_or(0),
        ))
    }

    fn parse_long(input: &str) -> Result<Self, VersionError> {
        let body = &input[1..];
        let (name, digits) = match body.split_once(',') {
            Some((name, rest)) => {
                let digits = rest
                    .trim()
                    .strip_prefix("Version=")
                    .map(|v| v.trim_start_matches(['v', 'V']))
                    .ok_or_else(|| VersionError::InvalidFormat {
                        input: input.to_string(),
                    })?;
                (name.trim(), digits)
            },
            None => {
                let split = body
                    .find(|c: char| c.is_ascii_digit())
                    .unwrap_or(body.len());
                body.split_at(split)
            },
        };

        let family = match name.to_ascii_lowercase().as_str() {
            "netframework" => FrameworkFamily::NetFramework,
            "netcoreapp" => FrameworkFamily::NetCoreApp,
            "netstandard" => FrameworkFamily::NetStandard,
            _ => {
                return Err(VersionError::InvalidFormat {
                    input: input.to_string(),
                })
            },
        };

        let (major, minor, patch) = Self::parse_numbers(digits, input)?;
        Ok(Self {
            family,
            major,
            minor,
            patch,
            platform: None,
        })
    }

    fn parse_short(input: &str) -> Result<Self, VersionError> {
        let lower = input.to_ascii_lowercase();
        let (moniker, platform) = match lower.split_once('-') {
            Some((m, p)) if !p.is_empty() => (m.to_string(), Some(p.to_string())),
            Some(_) => {
                return Err(VersionError::InvalidFormat {
                    input: input.to_string(),
                })
            },
            None => (lower.clone(), None),
        };

        if moniker == "any" || moniker == "dotnet" {
            return Ok(Self::any());
        }

        let (family, digits) = if let Some(rest) = moniker.strip_prefix("netstandard") {
            (FrameworkFamily::NetStandard, rest)
        } else if let Some(rest) = moniker.strip_prefix("netcoreapp") {
            (FrameworkFamily::NetCoreApp, rest)
        } else if let Some(rest) = moniker.strip_prefix("net") {
            (FrameworkFamily::NetFramework, rest)
        } else {
            return Err(VersionError::InvalidFormat {
                input: input.to_string(),
            });
        };

        let (major, minor, patch) = Self::parse_numbers(digits, input)?;

        // net5.0 and later continue the netcoreapp line
        let family = if family == FrameworkFamily::NetFramework && major >= 5 {
            FrameworkFamily::NetCoreApp
        } else {
            family
        };

        Ok(Self {
            family,
            major,
            minor,
            patch,
            platform,
        })
    }
}

impl Default for TargetFramework {
    fn default() -> Self {
        Self::new(FrameworkFamily::NetCoreApp, 5, 0)
    }
}

impl FromStr for TargetFramework {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(VersionError::InvalidFormat {
                input: s.to_string(),
            });
        }

        if input.starts_with('.') {
            Self::parse_long(input)
        } else {
            Self::parse_short(input)
        }
    }
}

impl fmt::Display for TargetFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            FrameworkFamily::Any => write!(f, "any")?,
            FrameworkFamily::NetStandard => write!(f, "netstandard{}.{}", self.major, self.minor)?,
            FrameworkFamily::NetCoreApp if self.major >= 5 => {
                write!(f, "net{}.{}", self.major, self.minor)?
            },
            FrameworkFamily::NetCoreApp => write!(f, "netcoreapp{}.{}", self.major, self.minor)?,
            FrameworkFamily::NetFramework => {
                write!(f, "net{}{}", self.major, self.minor)?;
                if self.patch > 0 {
                    write!(f, "{}", self.patch)?;
                }
            },
        }

        if let Some(ref platform) = self.platform {
            write!(f, "-{}", platform)?;
        }

        Ok(())
    }
}

impl Serialize for TargetFramework {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TargetFramework {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
