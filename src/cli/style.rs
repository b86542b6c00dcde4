//! Terminal styling helpers
//!
//! Output goes through `anstream`, which strips the escape codes when
//! stdout is not a terminal or `NO_COLOR` is set.

use owo_colors::OwoColorize;
use std::fmt::Display;

/// Success marker
pub const CHECK: &str = "✓";

/// Failure marker
pub const CROSS: &str = "✗";

/// Neutral marker
pub const DOT: &str = "·";

/// Semantic styles for CLI output
pub trait Stylize {
    /// De-emphasized text
    fn muted(&self) -> String;
    /// Names the user should notice (repositories, PRs)
    fn emphasis(&self) -> String;
    /// Addresses and paths
    fn accent(&self) -> String;
    /// Completed actions
    fn success(&self) -> String;
    /// Soft failures
    fn warn(&self) -> String;
    /// Hard failures
    fn error(&self) -> String;
}

impl<T: Display> Stylize for T {
    fn muted(&self) -> String {
        self.dimmed().to_string()
    }

    fn emphasis(&self) -> String {
        self.bold().to_string()
    }

    fn accent(&self) -> String {
        self.cyan().to_string()
    }

    fn success(&self) -> String {
        self.green().to_string()
    }

    fn warn(&self) -> String {
        self.yellow().to_string()
    }

    fn error(&self) -> String {
        self.red().to_string()
    }
}

/// Green check mark
pub fn check() -> String {
    CHECK.success()
}

/// Red cross
pub fn cross() -> String {
    CROSS.error()
}

/// Dimmed dot
pub fn dot() -> String {
    DOT.muted()
}
