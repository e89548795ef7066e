//! CLI command implementations

pub mod authenticate;
pub mod check_config;

use crate::OutputFormat;
use dirbind_core::DirbindConfig;

/// Process exit statuses
pub const EXIT_SUCCESS: u8 = 0;

/// The directory refused the user
pub const EXIT_REJECTED: u8 = 1;

/// The directory could not be reached or queried
pub const EXIT_UNAVAILABLE: u8 = 2;

/// Bad invocation or configuration; nothing was sent to the directory
pub const EXIT_USAGE: u8 = 3;

/// Context passed to all commands
pub struct CommandContext {
    pub config: DirbindConfig,
    pub output_format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    /// Check if output should be JSON
    pub fn is_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Print info message if not quiet
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg);
    }
}
