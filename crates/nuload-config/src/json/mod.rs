//! `*.deps.json` host manifest parsing
//!
//! A .NET application's deps file lists every library the host process loads
//! under `libraries`, keyed by `"<Name>/<Version>"`. Only that table is read.

use camino::Utf8Path;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use nuload_core::error::NuloadError;

use crate::ConfigResult;

/// The parts of a deps file nuload cares about
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DepsManifest {
    #[serde(default)]
    pub libraries: BTreeMap<String, DepsLibrary>,
}

/// One entry of the `libraries` table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DepsLibrary {
    /// `package`, `project` or `reference`
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl DepsLibrary {
    /// The application itself (or a sibling project), not a shipped library
    pub fn is_project(&self) -> bool {
        self.kind.eq_ignore_ascii_case("project")
    }
}

/// A host library as (id, version text)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLibrary {
    pub id: String,
    pub version: String,
}

impl DepsManifest {
    /// Every `Name/Version` key split into a library
    ///
    /// Project entries and malformed keys are skipped.
    pub fn host_libraries(&self) -> Vec<HostLibrary> {
        self.libraries
            .iter()
            .filter(|(key, library)| {
                if library.is_project() {
                    debug!("Ignoring project entry in deps file: {}", key);
                }
                !library.is_project()
            })
            .filter_map(|(key, _)| match key.rsplit_once('/') {
                Some((id, version)) if !id.is_empty() && !version.is_empty() => Some(HostLibrary {
                    id: id.to_string(),
                    version: version.to_string(),
                }),
                _ => {
                    debug!("Ignoring deps library key without a version: {}", key);
                    None
                },
            })
            .collect()
    }
}

/// Parse deps.json text; `file` names the origin in error messages
pub fn parse_deps_json(content: &str, file: &str) -> ConfigResult<DepsManifest> {
    serde_json::from_str(content).map_err(|e| NuloadError::ConfigParse {
        file: file.to_string(),
        message: e.to_string(),
        line: e.line(),
        column: e.column(),
    })
}

/// Load and parse a deps file
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<DepsManifest> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| NuloadError::io(format!("Failed to read {}", path), e))?;

    parse_deps_json(&content, path.as_str())
}
