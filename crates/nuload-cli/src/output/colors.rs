//! Terminal color support detection and formatting.
//!
//! Colors are used only when stderr is a terminal and `NO_COLOR` is unset.

use std::env;
use std::io::{self, IsTerminal};

/// Color support detection and formatting
#[derive(Debug, Clone, Copy)]
pub struct ColorSupport {
    enabled: bool,
}

impl ColorSupport {
    /// Detect color support automatically
    pub fn detect() -> Self {
        let enabled = env::var_os("NO_COLOR").is_none() && io::stderr().is_terminal();
        Self { enabled }
    }

    /// Force disable colors
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    pub fn green(&self, text: &str) -> String {
        self.paint("32", text)
    }

    pub fn yellow(&self, text: &str) -> String {
        self.paint("33", text)
    }

    pub fn red(&self, text: &str) -> String {
        self.paint("31", text)
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }

    /// Format text as dim/gray
    pub fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }
}
