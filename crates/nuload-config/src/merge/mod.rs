//! Configuration layering, fallback logic, and environment overrides
//!
//! Layers, lowest to highest: built-in defaults, `~/.nuload/config.toml`,
//! the project `nuload.toml`, `NULOAD_*` environment variables, CLI flags.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use tracing::debug;

use nuload_core::error::NuloadError;
use nuload_core::{DependencyBehavior, TargetFramework};

use crate::settings::{Settings, NULOAD_HOME_DIR};
use crate::toml::{NuloadToml, SourceEntry, CONFIG_FILE};
use crate::ConfigResult;

/// Environment variable names
pub const ENV_FRAMEWORK: &str = "NULOAD_FRAMEWORK";
pub const ENV_CACHE_DIR: &str = "NULOAD_CACHE_DIR";
pub const ENV_DIR: &str = "NULOAD_DIR";
pub const ENV_SOURCE: &str = "NULOAD_SOURCE";

/// Where a configuration layer came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Global config file
    Global(Utf8PathBuf),
    /// Project nuload.toml file
    Project(Utf8PathBuf),
    /// Environment variables
    Environment,
    /// CLI flags
    CommandLine,
}

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub directory: Option<Utf8PathBuf>,
    pub framework: Option<TargetFramework>,
    pub dependency_behavior: Option<DependencyBehavior>,
    pub concurrency: Option<usize>,
    pub cache_dir: Option<Utf8PathBuf>,
    /// `--source` values; replace every configured source when present
    pub sources: Vec<String>,
}

impl CliOverrides {
    fn into_layer(self) -> NuloadToml {
        let mut layer = NuloadToml::default();
        layer.install.directory = self.directory;
        layer.install.framework = self.framework;
        layer.install.dependency_behavior = self.dependency_behavior;
        layer.install.concurrency = self.concurrency;
        layer.cache.directory = self.cache_dir;
        layer.sources = self.sources.iter().map(|s| SourceEntry::from_arg(s)).collect();
        layer
    }
}

/// Main configuration loading interface
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
    /// Home directory, when one can be determined
    home: Option<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a loader rooted at `cwd`, using the user's home directory
    pub fn new(cwd: Utf8PathBuf) -> Self {
        let home = dirs::home_dir().and_then(|h| Utf8PathBuf::from_path_buf(h).ok());
        Self { cwd, home }
    }

    /// Replace the home directory (tests, sandboxes)
    pub fn with_home(mut self, home: Option<Utf8PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn cwd(&self) -> &Utf8Path {
        &self.cwd
    }

    /// `~/.nuload/config.toml`
    pub fn global_config_path(&self) -> Option<Utf8PathBuf> {
        self.home
            .as_ref()
            .map(|home| home.join(NULOAD_HOME_DIR).join("config.toml"))
    }

    /// Find nuload.toml in the working directory or one of its parents
    pub fn find_project_config(&self) -> Option<Utf8PathBuf> {
        self.cwd
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|path| path.is_file())
    }

    /// Load global configuration
    pub async fn load_global_config(&self) -> ConfigResult<Option<NuloadToml>> {
        match self.global_config_path() {
            Some(path) if path.is_file() => Ok(Some(crate::toml::load_from_file(&path).await?)),
            _ => Ok(None),
        }
    }

    /// Load the nearest project configuration
    pub async fn load_project_config(&self) -> ConfigResult<Option<(NuloadToml, Utf8PathBuf)>> {
        match self.find_project_config() {
            Some(path) => {
                let config = crate::toml::load_from_file(&path).await?;
                Ok(Some((config, path)))
            },
            None => Ok(None),
        }
    }

    /// Layer every source, reading `NULOAD_*` from the process environment
    pub async fn load(&self, cli: CliOverrides) -> ConfigResult<Settings> {
        self.load_with_env(cli, &ConfigLayering::collect_env_overrides()).await
    }

    /// Layer every source with an explicit set of environment variables
    pub async fn load_with_env(&self, cli: CliOverrides, env: &HashMap<String, String>) -> ConfigResult<Settings> {
        let mut layering = ConfigLayering::new();

        if let Some(path) = self.global_config_path().filter(|p| p.is_file()) {
            let config = crate::toml::load_from_file(&path).await?;
            let base = path.parent().unwrap_or(self.cwd.as_path()).to_path_buf();
            layering.push(ConfigSource::Global(path), config, &base, self.home.as_deref());
        }

        let project = self.load_project_config().await?;
        let base_dir = match &project {
            Some((_, path)) => path.parent().unwrap_or(self.cwd.as_path()).to_path_buf(),
            None => self.cwd.clone(),
        };
        let project_file = project.as_ref().map(|(_, path)| path.clone());
        if let Some((config, path)) = project {
            layering.push(ConfigSource::Project(path), config, &base_dir, self.home.as_deref());
        }

        layering.push(
            ConfigSource::Environment,
            ConfigLayering::env_layer(env)?,
            &self.cwd,
            self.home.as_deref(),
        );
        layering.push(ConfigSource::CommandLine, cli.into_layer(), &self.cwd, self.home.as_deref());

        debug!("Configuration layers: {:?}", layering.sources());
        let merged = layering.merged();

        let deps = match &merged.host.deps_file {
            Some(path) => Some(crate::json::load_from_file(path).await?),
            None => None,
        };

        let mut settings = Settings::from_config(merged, &base_dir, self.home.as_deref(), deps)?;
        settings.project_file = project_file;
        Ok(settings)
    }
}

/// Configuration layering and merging
#[derive(Debug, Default)]
pub struct ConfigLayering {
    layers: Vec<(ConfigSource, NuloadToml)>,
}

impl ConfigLayering {
    /// Create a new configuration layering system
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer above the existing ones; relative paths are anchored at `base`
    pub fn push(&mut self, source: ConfigSource, mut config: NuloadToml, base: &Utf8Path, home: Option<&Utf8Path>) {
        anchor_paths(&mut config, base, home);
        self.layers.push((source, config));
    }

    pub fn sources(&self) -> Vec<&ConfigSource> {
        self.layers.iter().map(|(source, _)| source).collect()
    }

    /// Fold every layer, highest last
    pub fn merged(&self) -> NuloadToml {
        self.layers
            .iter()
            .fold(NuloadToml::default(), |lower, (_, upper)| Self::merge_configs(lower, upper.clone()))
    }

    /// Merge two layers; `upper` wins
    ///
    /// Scalars are overridden individually. A non-empty source or package list
    /// replaces the lower one. Host ids and libraries accumulate.
    pub fn merge_configs(lower: NuloadToml, upper: NuloadToml) -> NuloadToml {
        let mut merged = lower;

        merged.install.directory = upper.install.directory.or(merged.install.directory);
        merged.install.framework = upper.install.framework.or(merged.install.framework);
        merged.install.dependency_behavior = upper
            .install
            .dependency_behavior
            .or(merged.install.dependency_behavior);
        merged.install.concurrency = upper.install.concurrency.or(merged.install.concurrency);
        merged.cache.directory = upper.cache.directory.or(merged.cache.directory);

        if !upper.sources.is_empty() {
            merged.sources = upper.sources;
        }
        if !upper.packages.is_empty() {
            merged.packages = upper.packages;
        }

        merged.host.deps_file = upper.host.deps_file.or(merged.host.deps_file);
        for id in upper.host.runtime_provided {
            if !merged.host.runtime_provided.iter().any(|known| known.eq_ignore_ascii_case(&id)) {
                merged.host.runtime_provided.push(id);
            }
        }
        merged.host.libraries.extend(upper.host.libraries);

        merged
    }

    /// Turn `NULOAD_*` variables into a layer
    pub fn env_layer(env: &HashMap<String, String>) -> ConfigResult<NuloadToml> {
        let mut layer = NuloadToml::default();

        if let Some(value) = non_empty(env, ENV_FRAMEWORK) {
            let framework = value.parse::<TargetFramework>().map_err(|e| NuloadError::ConfigValidation {
                field: ENV_FRAMEWORK.to_string(),
                reason: e.to_string(),
            })?;
            layer.install.framework = Some(framework);
        }
        if let Some(value) = non_empty(env, ENV_DIR) {
            layer.install.directory = Some(Utf8PathBuf::from(value));
        }
        if let Some(value) = non_empty(env, ENV_CACHE_DIR) {
            layer.cache.directory = Some(Utf8PathBuf::from(value));
        }
        if let Some(value) = non_empty(env, ENV_SOURCE) {
            layer.sources = value
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(SourceEntry::from_arg)
                .collect();
        }

        Ok(layer)
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars().filter(|(key, _)| key.starts_with("NULOAD_")).collect()
    }
}

fn non_empty<'a>(env: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Make every path of a layer absolute: `~/` expands to `home`, other relative paths join `base`
fn anchor_paths(config: &mut NuloadToml, base: &Utf8Path, home: Option<&Utf8Path>) {
    let anchor = |path: &mut Utf8PathBuf| {
        let expanded = match (path.strip_prefix("~"), home) {
            (Ok(rest), Some(home)) => home.join(rest),
            _ => base.join(&*path),
        };
        *path = expanded;
    };

    if let Some(path) = config.install.directory.as_mut() {
        anchor(path);
    }
    if let Some(path) = config.cache.directory.as_mut() {
        anchor(path);
    }
    if let Some(path) = config.host.deps_file.as_mut() {
        anchor(path);
    }
    for source in &mut config.sources {
        if let Some(path) = source.path.as_mut() {
            anchor(path);
        }
    }
}
