//! Error message formatting with actionable suggestions.
//!
//! Prints the error, the file location for configuration errors, a hint
//! when one exists, and the chain of underlying causes.

use std::error::Error;

use nuload_core::error::NuloadError;

use super::colors::ColorSupport;

/// Error formatter with suggestions
pub struct ErrorFormatter {
    colors: ColorSupport,
}

impl ErrorFormatter {
    /// Create a new error formatter
    pub fn new() -> Self {
        Self {
            colors: ColorSupport::detect(),
        }
    }

    pub fn with_colors(colors: ColorSupport) -> Self {
        Self { colors }
    }

    /// Format an error with context and suggestions
    pub fn format_error(&self, error: &NuloadError) -> String {
        let mut output = String::new();

        output.push_str(&self.colors.red("error"));
        output.push_str(": ");
        output.push_str(&error.to_string());
        output.push('\n');

        if let NuloadError::ConfigParse { file, line, column, .. } = error {
            if *line > 0 {
                output.push_str(&self.format_location(file, *line, *column));
                output.push('\n');
            }
        }

        let mut source = error.source();
        while let Some(err) = source {
            output.push_str(&self.colors.dim("caused by"));
            output.push_str(": ");
            output.push_str(&err.to_string());
            output.push('\n');
            source = err.source();
        }

        // Hints come from the innermost nuload error
        if let Some(suggestion) = innermost(error).suggestion() {
            output.push_str(&self.colors.dim("help"));
            output.push_str(": ");
            output.push_str(suggestion);
            output.push('\n');
        }

        output
    }

    /// Format file location context
    pub fn format_location(&self, file: &str, line: usize, column: usize) -> String {
        format!("  {} {}:{}:{}", self.colors.dim("-->"), file, line, column)
    }
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn innermost(error: &NuloadError) -> &NuloadError {
    match error {
        NuloadError::Acquisition { source, .. } => innermost(source),
        other => other,
    }
}
