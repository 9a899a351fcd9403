//! # nuload
//!
//! Installs NuGet packages and their dependencies into a local directory.
//!
//! This is the main entry point for the nuload CLI tool. It handles command parsing,
//! sets up logging and error handling, and dispatches to the appropriate command handlers.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use nuload_core::{DependencyBehavior, TargetFramework};

mod commands;
mod output;

use commands::CommandContext;
use output::errors::ErrorFormatter;

/// Resolve, download and extract NuGet packages
#[derive(Debug, Parser)]
#[command(name = "nuload", version, about = "Resolve, download and extract NuGet packages")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install a package and its dependencies
    Install {
        /// Package id
        id: String,
        /// Version range in NuGet syntax; latest when omitted
        #[arg(long)]
        version: Option<String>,
        /// Allow prerelease versions for the root package
        #[arg(long)]
        prerelease: bool,
        #[command(flatten)]
        options: InstallOptions,
    },
    /// Install every [[package]] listed in nuload.toml
    Restore {
        #[command(flatten)]
        options: InstallOptions,
    },
    /// List the versions a source knows for a package
    Versions {
        /// Package id
        id: String,
        /// Include prerelease versions
        #[arg(long)]
        prerelease: bool,
        /// Package source URL or feed directory (repeatable)
        #[arg(long = "source", value_name = "URL")]
        sources: Vec<String>,
    },
    /// Remove downloaded packages from the cache
    Clean {
        /// Only remove entries not used for this many days
        #[arg(long, value_name = "DAYS")]
        older_than: Option<u32>,
        /// Cache directory to clean
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<camino::Utf8PathBuf>,
    },
}

/// Options shared by `install` and `restore`
#[derive(Debug, Clone, Default, Args)]
pub struct InstallOptions {
    /// Target directory for extracted packages
    #[arg(long, value_name = "DIR")]
    pub dir: Option<camino::Utf8PathBuf>,
    /// Host target framework, e.g. net5.0
    #[arg(long, value_name = "TFM")]
    pub framework: Option<TargetFramework>,
    /// Prefer the highest version satisfying each dependency
    #[arg(long)]
    pub highest: bool,
    /// Package source URL or feed directory (repeatable)
    #[arg(long = "source", value_name = "URL")]
    pub sources: Vec<String>,
    /// Concurrent lookups and extractions
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,
}

impl InstallOptions {
    pub fn dependency_behavior(&self) -> Option<DependencyBehavior> {
        self.highest.then_some(DependencyBehavior::Highest)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    debug!("Starting nuload v{}", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

    let result = runtime.block_on(async {
        let ctx = CommandContext::new()?;
        ctx.cancel_on_ctrl_c();
        commands::dispatch_command(cli.command, &ctx).await
    });

    if let Err(e) = result {
        eprintln!("{}", ErrorFormatter::new().format_error(&e));
        std::process::exit(1);
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise nuload crates log at info, or debug with `--verbose`
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let default_directives = [
        "nuload",
        "nuload_core",
        "nuload_config",
        "nuload_registry",
        "nuload_resolver",
        "nuload_cache",
    ]
    .iter()
    .map(|target| format!("{}={}", target, level))
    .collect::<Vec<_>>()
    .join(",");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("nuload encountered an unexpected error: {}", panic_info);
        eprintln!("nuload crashed! This is a bug.");
        eprintln!("Error: {}", panic_info);
    }));
}
