//! Command line interface for xpi_nightly.
//!
//! Parses arguments, configures logging and runs one publish, reporting the
//! outcome through colored terminal output.

mod args;
pub mod commands;
mod output;

pub use args::{Args, RuntimeConfig};
pub use commands::execute_command;
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    init_logging(args.verbose, args.quiet);
    execute_command(args).await
}

/// Install the `env_logger` backend.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects `debug`, `--quiet`
/// selects `error` and the default is `info`.
pub fn init_logging(verbose: bool, quiet: bool) {
    let default_filter = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_target(false)
        .try_init();
}
