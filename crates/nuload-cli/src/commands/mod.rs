//! Command implementations and dispatch logic.
//!
//! Each command is implemented as an async function that takes a CommandContext.

use camino::Utf8PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use nuload_config::{CliOverrides, ConfigLoader, HostSettings, Settings, SourceLocation, SourceSpec};
use nuload_core::error::{NuloadError, NuloadResult};
use nuload_core::SourceOrigin;
use nuload_registry::{LocalFeed, NugetClient, PackageSource, SourceSet};
use nuload_resolver::HostEnvironment;

pub mod clean;
pub mod install;
pub mod restore;
pub mod versions;


use crate::{output::OutputHandler, Commands, InstallOptions};

/// Shared context for all commands
pub struct CommandContext {
    pub cwd: Utf8PathBuf,
    /// Home directory for the global config; `None` skips it
    pub home: Option<Utf8PathBuf>,
    pub output: OutputHandler,
    pub cancel: CancellationToken,
}

impl CommandContext {
    /// Create a context for the current directory
    pub fn new() -> NuloadResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| NuloadError::io("Failed to get current directory".to_string(), e))?;
        let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(|path| NuloadError::ConfigValidation {
            field: "cwd".to_string(),
            reason: format!("{} is not valid UTF-8", path.display()),
        })?;
        let home = dirs::home_dir().and_then(|h| Utf8PathBuf::from_path_buf(h).ok());

        Ok(Self {
            cwd,
            home,
            output: OutputHandler::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Cancel running work on the first Ctrl-C
    pub fn cancel_on_ctrl_c(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    /// Layered settings for this invocation
    pub async fn settings(&self, overrides: CliOverrides) -> NuloadResult<Settings> {
        let settings = ConfigLoader::new(self.cwd.clone())
            .with_home(self.home.clone())
            .load(overrides)
            .await?;
        debug!("Settings: {:?}", settings);
        Ok(settings)
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> NuloadResult<()> {
    match command {
        Commands::Install {
            id,
            version,
            prerelease,
            options,
        } => {
            debug!("Installing {} (version: {:?}, prerelease: {})", id, version, prerelease);
            install::execute(&id, version.as_deref(), prerelease, options, ctx).await
        },
        Commands::Restore { options } => {
            debug!("Restoring packages from nuload.toml");
            restore::execute(options, ctx).await
        },
        Commands::Versions { id, prerelease, sources } => {
            debug!("Listing versions of {}", id);
            versions::execute(&id, prerelease, sources, ctx).await
        },
        Commands::Clean { older_than, cache_dir } => {
            debug!("Cleaning cache (older than: {:?} days)", older_than);
            clean::execute(older_than, cache_dir, ctx).await
        },
    }
}

impl From<InstallOptions> for CliOverrides {
    fn from(options: InstallOptions) -> Self {
        Self {
            dependency_behavior: options.dependency_behavior(),
            directory: options.dir,
            framework: options.framework,
            concurrency: options.concurrency.map(usize::from),
            cache_dir: None,
            sources: options.sources,
        }
    }
}

/// Open every configured source in priority order
pub fn build_sources(specs: &[SourceSpec]) -> NuloadResult<SourceSet> {
    let mut sources = SourceSet::default();

    for spec in specs {
        let source: Arc<dyn PackageSource> = match &spec.location {
            SourceLocation::Url(url) => Arc::new(NugetClient::new(SourceOrigin::new(&spec.name, url))?),
            SourceLocation::Path(path) => Arc::new(LocalFeed::open(&spec.name, path)?),
        };
        debug!("Using source {} ({})", spec.name, source.origin().location);
        sources.push(source);
    }

    Ok(sources)
}

/// The built-in runtime list plus configured ids and libraries
pub fn build_host(settings: &HostSettings) -> HostEnvironment {
    let mut host = HostEnvironment::new();
    for id in &settings.runtime_provided {
        host.add_runtime_provided(id);
    }
    for library in &settings.libraries {
        host.add_library(&library.id, library.version.clone());
    }
    host
}
