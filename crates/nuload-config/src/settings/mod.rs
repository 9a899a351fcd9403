//! Effective settings after layering, with defaults filled in

use camino::{Utf8Path, Utf8PathBuf};

use nuload_core::error::NuloadError;
use nuload_core::{DependencyBehavior, PackageRequest, TargetFramework};

use crate::json::{DepsManifest, HostLibrary};
use crate::toml::{NuloadToml, SourceLocation};
use crate::ConfigResult;

/// Default number of concurrent lookups and extractions
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default target root, relative to the project directory
pub const DEFAULT_INSTALL_DIR: &str = "packages";

/// Source used when none is configured
pub const NUGET_ORG_NAME: &str = "nuget.org";
pub const NUGET_ORG_URL: &str = "https://api.nuget.org/v3/index.json";

/// Directory under the home directory holding global state
pub const NULOAD_HOME_DIR: &str = ".nuload";

/// A configured package source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub name: String,
    pub location: SourceLocation,
}

/// What the host process already supplies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSettings {
    /// Extra runtime-provided ids on top of the built-in list
    pub runtime_provided: Vec<String>,
    /// Deps-file libraries first, then the `[host.libraries]` table
    pub libraries: Vec<HostLibrary>,
}

/// Fully resolved configuration used by the commands
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub install_dir: Utf8PathBuf,
    pub framework: TargetFramework,
    pub behavior: DependencyBehavior,
    pub concurrency: usize,
    pub cache_dir: Utf8PathBuf,
    pub sources: Vec<SourceSpec>,
    pub host: HostSettings,
    pub packages: Vec<PackageRequest>,
    /// The project nuload.toml, when one was found
    pub project_file: Option<Utf8PathBuf>,
}

impl Settings {
    /// Fill defaults into a merged configuration whose paths are already absolute
    ///
    /// `base_dir` anchors the default install directory and `home` the
    /// default cache directory (falling back to `base_dir`).
    pub fn from_config(
        config: NuloadToml,
        base_dir: &Utf8Path,
        home: Option<&Utf8Path>,
        deps: Option<DepsManifest>,
    ) -> ConfigResult<Self> {
        let install_dir = config
            .install
            .directory
            .unwrap_or_else(|| base_dir.join(DEFAULT_INSTALL_DIR));

        let cache_dir = config.cache.directory.unwrap_or_else(|| default_cache_dir(base_dir, home));

        let mut sources = Vec::with_capacity(config.sources.len());
        for entry in &config.sources {
            sources.push(SourceSpec {
                name: entry.name.clone(),
                location: entry.location()?,
            });
        }
        if sources.is_empty() {
            sources.push(SourceSpec {
                name: NUGET_ORG_NAME.to_string(),
                location: SourceLocation::Url(NUGET_ORG_URL.to_string()),
            });
        }

        let mut libraries = deps.map(|d| d.host_libraries()).unwrap_or_default();
        libraries.extend(config.host.libraries.into_iter().map(|(id, version)| HostLibrary { id, version }));

        let packages = config
            .packages
            .iter()
            .map(|p| p.to_request())
            .collect::<ConfigResult<Vec<_>>>()?;

        let concurrency = config.install.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(NuloadError::ConfigValidation {
                field: "install.concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            install_dir,
            framework: config.install.framework.unwrap_or_default(),
            behavior: config.install.dependency_behavior.unwrap_or_default(),
            concurrency,
            cache_dir,
            sources,
            host: HostSettings {
                runtime_provided: config.host.runtime_provided,
                libraries,
            },
            packages,
            project_file: None,
        })
    }
}

/// `~/.nuload/packages`, or `<base_dir>/.nuload/packages` without a home directory
pub fn default_cache_dir(base_dir: &Utf8Path, home: Option<&Utf8Path>) -> Utf8PathBuf {
    home.unwrap_or(base_dir).join(NULOAD_HOME_DIR).join("packages")
}
