//! nuload.toml parsing and serialization

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

use nuload_core::error::NuloadError;
use nuload_core::{DependencyBehavior, PackageRequest, TargetFramework};

use crate::ConfigResult;

/// Project configuration file name
pub const CONFIG_FILE: &str = "nuload.toml";

/// Complete nuload.toml configuration
///
/// Every scalar is optional so that files can be layered on top of each other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NuloadToml {
    #[serde(default)]
    pub install: InstallSection,

    #[serde(default)]
    pub cache: CacheSection,

    /// Package sources in priority order
    #[serde(default, rename = "source", skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceEntry>,

    #[serde(default)]
    pub host: HostSection,

    /// Packages installed by `nuload restore`
    #[serde(default, rename = "package", skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<PackageEntry>,
}

/// `[install]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct InstallSection {
    /// Target root for extracted packages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<Utf8PathBuf>,

    /// Host target framework
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<TargetFramework>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency_behavior: Option<DependencyBehavior>,

    /// Concurrent registry lookups and extractions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

/// `[cache]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<Utf8PathBuf>,
}

/// One `[[source]]` entry: a registry URL or a feed directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceEntry {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Utf8PathBuf>,
}

/// Where a source lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// NuGet v3 service index
    Url(String),
    /// Local feed directory
    Path(Utf8PathBuf),
}

impl SourceEntry {
    pub fn url(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            path: None,
        }
    }

    pub fn path(name: impl Into<String>, path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            name: name.into(),
            url: None,
            path: Some(path.into()),
        }
    }

    /// Parse a `--source` / `NULOAD_SOURCE` value: URLs contain "://", anything else is a directory
    pub fn from_arg(value: &str) -> Self {
        if value.contains("://") {
            Self::url(value, value)
        } else {
            Self::path(value, value)
        }
    }

    /// The configured location; exactly one of `url` and `path` must be set
    pub fn location(&self) -> ConfigResult<SourceLocation> {
        match (&self.url, &self.path) {
            (Some(url), None) => Ok(SourceLocation::Url(url.clone())),
            (None, Some(path)) => Ok(SourceLocation::Path(path.clone())),
            _ => Err(NuloadError::ConfigValidation {
                field: format!("source.{}", self.name),
                reason: "a source needs exactly one of 'url' or 'path'".to_string(),
            }),
        }
    }
}

/// `[host]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct HostSection {
    /// `*.deps.json` manifest describing the host's libraries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deps_file: Option<Utf8PathBuf>,

    /// Ids the runtime always supplies, added to the built-in list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtime_provided: Vec<String>,

    /// Library id -> version the host already loads
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub libraries: BTreeMap<String, String>,
}

/// One `[[package]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageEntry {
    pub id: String,

    /// NuGet version range; latest when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub prerelease: bool,
}

impl PackageEntry {
    pub fn to_request(&self) -> ConfigResult<PackageRequest> {
        PackageRequest::parse(&self.id, self.version.as_deref(), self.prerelease)
    }
}

/// Parse TOML text; `file` names the origin in error messages
pub fn parse_nuload_toml(content: &str, file: &str) -> ConfigResult<NuloadToml> {
    // toml_edit first: its syntax errors carry precise spans
    if let Err(e) = content.parse::<toml_edit::DocumentMut>() {
        return Err(parse_error(file, content, e.message(), e.span()));
    }

    let config: NuloadToml =
        toml::from_str(content).map_err(|e| parse_error(file, content, e.message(), e.span()))?;

    validate_config(&config)?;

    Ok(config)
}

/// Serialize a configuration back to TOML
pub fn serialize_nuload_toml(config: &NuloadToml) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| NuloadError::ConfigValidation {
        field: CONFIG_FILE.to_string(),
        reason: format!("TOML serialization error: {}", e),
    })
}

/// Load and parse a configuration file
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<NuloadToml> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| NuloadError::io(format!("Failed to read {}", path), e))?;

    parse_nuload_toml(&content, path.as_str())
}

/// Checks serde cannot express
pub fn validate_config(config: &NuloadToml) -> ConfigResult<()> {
    if config.install.concurrency == Some(0) {
        return Err(NuloadError::ConfigValidation {
            field: "install.concurrency".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    for source in &config.sources {
        if source.name.trim().is_empty() {
            return Err(NuloadError::ConfigValidation {
                field: "source.name".to_string(),
                reason: "source names must not be empty".to_string(),
            });
        }
        source.location()?;
    }

    for package in &config.packages {
        package.to_request()?;
    }

    if let Some(empty) = config.host.libraries.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(NuloadError::ConfigValidation {
            field: format!("host.libraries.{}", empty.0),
            reason: "a library needs a version".to_string(),
        });
    }

    Ok(())
}

fn parse_error(file: &str, content: &str, message: &str, span: Option<Range<usize>>) -> NuloadError {
    let (line, column) = span.map(|s| line_column(content, s.start)).unwrap_or((0, 0));
    NuloadError::ConfigParse {
        file: file.to_string(),
        message: message.trim().to_string(),
        line,
        column,
    }
}

/// 1-based line and column of a byte offset
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(content.len());
    let before = &content.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    let column = String::from_utf8_lossy(&before[line_start..]).chars().count() + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[install]
directory = "packages"
framework = "net5.0"
dependency-behavior = "highest"
concurrency = 4

[cache]
directory = "/tmp/nuload-cache"

[[source]]
name = "nuget.org"
url = "https://api.nuget.org/v3/index.json"

[[source]]
name = "offline"
path = "./feed"

[host]
deps-file = "app.deps.json"
runtime-provided = ["My.Runtime"]
libraries = { "Newtonsoft.Json" = "13.0.1" }

[[package]]
id = "Serilog"
version = "[2.10.0,3.0.0)"

[[package]]
id = "Preview.Lib"
prerelease = true
"#;

    #[test]
    fn test_parse_full_config() {
        let config = parse_nuload_toml(FULL, CONFIG_FILE).unwrap();

        assert_eq!(config.install.directory.as_deref(), Some(Utf8Path::new("packages")));
        assert_eq!(config.install.framework, Some("net5.0".parse().unwrap()));
        assert_eq!(config.install.dependency_behavior, Some(DependencyBehavior::Highest));
        assert_eq!(config.install.concurrency, Some(4));

        assert_eq!(config.sources.len(), 2);
        assert_eq!(
            config.sources[0].location().unwrap(),
            SourceLocation::Url("https://api.nuget.org/v3/index.json".to_string())
        );
        assert_eq!(config.sources[1].location().unwrap(), SourceLocation::Path("./feed".into()));

        assert_eq!(config.host.runtime_provided, vec!["My.Runtime"]);
        assert_eq!(config.host.libraries.get("Newtonsoft.Json").unwrap(), "13.0.1");

        let requests: Vec<PackageRequest> = config.packages.iter().map(|p| p.to_request().unwrap()).collect();
        assert_eq!(requests[0].id, "Serilog");
        assert!(requests[0].version_range.is_some());
        assert!(requests[1].version_range.is_none());
        assert!(requests[1].allow_prerelease);
    }

    #[test]
    fn test_empty_config() {
        let config = parse_nuload_toml("", CONFIG_FILE).unwrap();
        assert_eq!(config, NuloadToml::default());
    }

    #[test]
    fn test_syntax_error_has_location() {
        let content = "[install]\ndirectory = \"packages\"\nframework = \n";
        match parse_nuload_toml(content, "nuload.toml") {
            Err(NuloadError::ConfigParse { file, line, column, .. }) => {
                assert_eq!(file, "nuload.toml");
                assert_eq!(line, 3);
                assert!(column > 1);
            },
            other => panic!("expected ConfigParse, got {:?}", other),
        }
    }

    #[test]
    fn test_type_error_has_location() {
        let content = "[install]\nconcurrency = \"many\"\n";
        match parse_nuload_toml(content, "nuload.toml") {
            Err(NuloadError::ConfigParse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected ConfigParse, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let content = "[install]\ndirectroy = \"packages\"\n";
        assert!(matches!(
            parse_nuload_toml(content, "nuload.toml"),
            Err(NuloadError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_invalid_values() {
        let zero = "[install]\nconcurrency = 0\n";
        assert!(matches!(
            parse_nuload_toml(zero, "nuload.toml"),
            Err(NuloadError::ConfigValidation { .. })
        ));

        let both = "[[source]]\nname = \"x\"\nurl = \"https://x\"\npath = \"./x\"\n";
        assert!(matches!(
            parse_nuload_toml(both, "nuload.toml"),
            Err(NuloadError::ConfigValidation { .. })
        ));

        let neither = "[[source]]\nname = \"x\"\n";
        assert!(parse_nuload_toml(neither, "nuload.toml").is_err());

        let bad_range = "[[package]]\nid = \"Foo\"\nversion = \"[1.0\"\n";
        assert!(matches!(
            parse_nuload_toml(bad_range, "nuload.toml"),
            Err(NuloadError::InvalidConstraint { .. })
        ));

        let bad_behavior = "[install]\ndependency-behavior = \"newest\"\n";
        assert!(parse_nuload_toml(bad_behavior, "nuload.toml").is_err());
    }

    #[test]
    fn test_round_trip_serialization() {
        let config = parse_nuload_toml(FULL, CONFIG_FILE).unwrap();
        let serialized = serialize_nuload_toml(&config).unwrap();
        let reparsed = parse_nuload_toml(&serialized, CONFIG_FILE).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_source_from_arg() {
        assert_eq!(
            SourceEntry::from_arg("https://example.org/index.json").location().unwrap(),
            SourceLocation::Url("https://example.org/index.json".to_string())
        );
        assert_eq!(
            SourceEntry::from_arg("./feed").location().unwrap(),
            SourceLocation::Path("./feed".into())
        );
    }

    #[test]
    fn test_line_column() {
        let text = "ab\ncde\nf";
        assert_eq!(line_column(text, 0), (1, 1));
        assert_eq!(line_column(text, 4), (2, 2));
        assert_eq!(line_column(text, 7), (3, 1));
        assert_eq!(line_column(text, 100), (3, 2));
    }
}
