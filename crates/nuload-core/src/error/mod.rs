//! Error types and result aliases for nuload operations.
//!
//! Provides a unified error type that covers all possible error conditions
//! across the nuload crates with actionable error messages.

use thiserror::Error;

/// Unified error type for all nuload operations
#[derive(Error, Debug)]
pub enum NuloadError {
    // Config errors
    #[error("Failed to parse {file}: {message} at line {line}, column {column}")]
    ConfigParse {
        file: String,
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // Registry errors
    #[error("Package '{id}' ({range}) not found at any configured source")]
    PackageNotFound { id: String, range: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Resolution errors
    #[error("Invalid version range '{input}': {reason}")]
    InvalidConstraint { input: String, reason: String },

    #[error("Unable to resolve a single version for {}: {details}", .ids.join(", "))]
    Unsatisfiable { ids: Vec<String>, details: String },

    // Acquisition errors
    #[error("Failed to acquire {id} {version} from {origin}")]
    Acquisition {
        id: String,
        version: String,
        origin: String,
        #[source]
        source: Box<NuloadError>,
    },

    #[error("Integrity check failed for {package}: expected {expected}, got {actual}")]
    IntegrityFailure {
        package: String,
        expected: String,
        actual: String,
    },

    #[error("Archive error: {message}")]
    Archive { message: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result type alias for nuload operations
pub type NuloadResult<T> = Result<T, NuloadError>;

impl NuloadError {
    /// Create a network error from any error type
    pub fn network<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Create an archive error
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    /// Wrap an error raised while downloading or extracting one package
    pub fn acquisition(id: &str, version: &str, origin: &str, source: NuloadError) -> Self {
        Self::Acquisition {
            id: id.to_string(),
            version: version.to_string(),
            origin: origin.to_string(),
            source: Box::new(source),
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, NuloadError::Network { .. } | NuloadError::Io { .. })
    }

    /// Check if this error reports a package missing from every source
    pub fn is_not_found(&self) -> bool {
        matches!(self, NuloadError::PackageNotFound { .. })
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            NuloadError::PackageNotFound { .. } => {
                Some("Check the package id spelling, the version range and the configured sources")
            },
            NuloadError::Network { .. } => Some("Check your internet connection and try again"),
            NuloadError::InvalidConstraint { .. } => {
                Some("Use NuGet range syntax such as 1.0, [1.0,2.0) or comparators like >=1.0 <2.0")
            },
            NuloadError::Unsatisfiable { .. } => {
                Some("Relax the requested version ranges or install the conflicting packages separately")
            },
            NuloadError::IntegrityFailure { .. } => {
                Some("Run 'nuload clean' to drop the download cache and try again")
            },
            NuloadError::ConfigParse { .. } | NuloadError::ConfigValidation { .. } => {
                Some("Fix nuload.toml and run the command again")
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsatisfiable_names_ids() {
        let err = NuloadError::Unsatisfiable {
            ids: vec!["B".to_string(), "C".to_string()],
            details: "no overlap".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("B, C"));
        assert!(message.contains("no overlap"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_acquisition_keeps_source_chain() {
        use std::error::Error;

        let inner = NuloadError::archive("truncated zip");
        let err = NuloadError::acquisition("Foo", "1.0.0", "nuget.org", inner);

        assert_eq!(err.to_string(), "Failed to acquire Foo 1.0.0 from nuget.org");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Archive error: truncated zip"));
    }

    #[test]
    fn test_recoverable_kinds() {
        let io = NuloadError::io(
            "read failed".to_string(),
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert!(io.is_recoverable());
        assert!(!NuloadError::Cancelled.is_recoverable());

        let missing = NuloadError::PackageNotFound {
            id: "Foo".to_string(),
            range: "*".to_string(),
        };
        assert!(missing.is_not_found());
    }
}
