//! Terminal output formatting and utilities.
//!
//! Results go to stdout; warnings and errors go to stderr so that
//! `nuload versions` output stays pipeable.

pub mod colors;
pub mod errors;

/// Output handler for consistent terminal formatting
pub struct OutputHandler {
    colors: colors::ColorSupport,
}

impl OutputHandler {
    /// Create a new output handler
    pub fn new() -> Self {
        Self {
            colors: colors::ColorSupport::detect(),
        }
    }

    /// Handler that never emits escape codes
    #[cfg(test)]
    pub fn plain() -> Self {
        Self {
            colors: colors::ColorSupport::disabled(),
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        eprintln!("{}", self.colors.dim(message));
    }

    /// Print a result line
    pub fn item(&self, message: &str) {
        println!("{}", message);
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", self.colors.green("✓"), message);
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", self.colors.yellow("⚠"), message);
    }

    /// Print a phase heading
    pub fn step(&self, message: &str) {
        eprintln!("{} {}", self.colors.bold("=>"), message);
    }
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new()
    }
}
