//! Configuration parsing for nuload
//!
//! This crate handles parsing and validation of nuload.toml and `*.deps.json`
//! host manifests, and layers global, project, environment and CLI values
//! into one [`Settings`] value.

pub mod json;
pub mod merge;
pub mod settings;
pub mod toml;

// Re-export main types
pub use self::json::{DepsManifest, HostLibrary};
pub use self::merge::{CliOverrides, ConfigLayering, ConfigLoader, ConfigSource};
pub use self::settings::{HostSettings, Settings, SourceSpec, DEFAULT_CONCURRENCY};
pub use self::toml::{NuloadToml, PackageEntry, SourceEntry, SourceLocation, CONFIG_FILE};

use nuload_core::error::NuloadError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, NuloadError>;
