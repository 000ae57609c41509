//! Command line argument parsing and validation.

use crate::config::DEFAULT_CONFIG_FILE;
use clap::Parser;
use std::path::PathBuf;

/// Publish a nightly XPI build to GitHub releases
#[derive(Parser, Debug)]
#[command(
    name = "xpi_nightly",
    version,
    about = "Publish a nightly XPI build to GitHub releases",
    long_about = "Build an XPI from the configured working copy, tag and mirror-push it, \
create a GitHub release with the XPI attached and update the update.rdf descriptor.

Exits 0 when a nightly was published or HEAD was already published, 1 on failure."
)]
pub struct Args {
    /// Configuration file
    #[arg(
        short,
        long,
        value_name = "PATH",
        env = "XPI_NIGHTLY_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,

    /// Publish even when HEAD is already tagged
    #[arg(short, long)]
    pub force: bool,

    /// Build the XPI and stop before tagging, pushing or uploading
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.config.as_os_str().is_empty() {
            return Err("--config must not be empty".to_string());
        }
        Ok(())
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
    /// Configuration file
    pub config_path: PathBuf,
    /// Publish even when HEAD is already tagged
    pub force: bool,
    /// Stop after building
    pub dry_run: bool,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
            config_path: args.config.clone(),
            force: args.force,
            dry_run: args.dry_run,
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print verbose message
    pub fn verbose_println(&self, message: &str) {
        let _ = self.output.verbose(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }
}
