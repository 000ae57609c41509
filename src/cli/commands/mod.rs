//! Command execution with error reporting.

mod publish;

use crate::cli::{Args, RuntimeConfig};
use crate::error::{CliError, Result};

use publish::execute_publish;

/// Execute the publish command based on parsed arguments.
///
/// Invalid arguments are returned as [`CliError`]; publish failures are
/// reported here and turned into exit code 1.
pub async fn execute_command(args: Args) -> Result<i32> {
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let config = RuntimeConfig::from(&args);

    match execute_publish(&config).await {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            config.error_println(&format!("Publish failed: {e}"));
            if e.is_post_publish() {
                config.warning_println("The release is live but the update descriptor was not written");
            }

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                config.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    config.println(&format!("  • {suggestion}"));
                }
            }

            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReleaseError;
    use std::path::PathBuf;

    fn args(config: PathBuf) -> Args {
        Args {
            config,
            force: false,
            dry_run: false,
            verbose: false,
            quiet: true,
        }
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_cli_errors() {
        let err = execute_command(args(PathBuf::new())).await.unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::Cli(CliError::InvalidArguments { .. })
        ));
    }

    #[tokio::test]
    async fn test_publish_failure_is_exit_code_one() {
        let dir = tempfile::tempdir().unwrap();
        let code = execute_command(args(dir.path().join("absent.toml")))
            .await
            .unwrap();
        assert_eq!(code, 1);
    }
}
