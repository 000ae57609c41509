//! Error types for xpi_nightly operations.
//!
//! Every fatal condition of a publish maps onto one of these variants, together
//! with actionable recovery suggestions for the operator.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for xpi_nightly operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all xpi_nightly operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Artifact assembly or manifest patching errors
    #[error("Build error: {0}")]
    Build(#[from] crate::bundler::Error),

    /// Git operation errors
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// GitHub release API errors
    #[error("GitHub error: {0}")]
    GitHub(#[from] GitHubError),

    /// Update descriptor errors
    #[error("Update descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// A remote step failed and one or more compensating actions failed too
    #[error("{source} (rollback incomplete: {})", .rollback_warnings.join("; "))]
    RollbackIncomplete {
        /// The failure that triggered the rollback
        source: Box<ReleaseError>,
        /// Compensations that could not be completed
        rollback_warnings: Vec<String>,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}: {error}")]
    Read {
        /// Path to the configuration file
        path: PathBuf,
        /// The underlying I/O error
        error: std::io::Error,
    },

    /// Configuration file is not valid TOML or has the wrong shape
    #[error("Failed to parse configuration file {path}: {error}")]
    Parse {
        /// Path to the configuration file
        path: PathBuf,
        /// The underlying TOML error
        error: toml::de::Error,
    },

    /// A required value is absent
    #[error("Missing required configuration value: {field}")]
    Missing {
        /// Dotted name of the missing field
        field: String,
    },

    /// A value is present but unusable
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Dotted name of the field
        field: String,
        /// Reason for the error
        reason: String,
    },
}

/// XML document errors
#[derive(Error, Debug)]
pub enum XmlError {
    /// Input is not well-formed XML
    #[error("malformed XML: {reason}")]
    Malformed {
        /// Reason for the error
        reason: String,
    },

    /// Serialization failed
    #[error("failed to serialize XML: {reason}")]
    Write {
        /// Reason for the error
        reason: String,
    },
}

/// Git operation errors
#[derive(Error, Debug)]
pub enum GitError {
    /// The git executable is not on PATH
    #[error("git executable not found. Please install git and make sure it is on PATH.")]
    GitNotFound,

    /// Not a git repository
    #[error("{path} is not a git working copy")]
    NotRepository {
        /// Path that was opened
        path: PathBuf,
    },

    /// The git process could not be started
    #[error("Failed to run git {operation}: {error}")]
    Spawn {
        /// Git subcommand
        operation: String,
        /// The underlying I/O error
        error: std::io::Error,
    },

    /// The git process exited unsuccessfully
    #[error("git {operation} failed: {stderr}")]
    CommandFailed {
        /// Git subcommand
        operation: String,
        /// Captured standard error, with secrets redacted
        stderr: String,
    },

    /// The git process did not finish in time
    #[error("git {operation} timed out after {seconds}s")]
    Timeout {
        /// Git subcommand
        operation: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// Git produced output that could not be interpreted
    #[error("Unexpected git output: {reason}")]
    InvalidOutput {
        /// Reason for the error
        reason: String,
    },
}

/// GitHub release API errors
#[derive(Error, Debug)]
pub enum GitHubError {
    /// The HTTP request could not be completed
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a status the operation does not accept
    #[error("{operation} returned HTTP {status}: {body}")]
    UnexpectedStatus {
        /// API operation
        operation: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// The API answered with a body that could not be understood
    #[error("invalid response to {operation}: {reason}")]
    InvalidResponse {
        /// API operation
        operation: &'static str,
        /// Reason for the error
        reason: String,
    },

    /// A URL returned by the API or built from configuration is invalid
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Update descriptor errors
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// Descriptor (or its template) could not be read
    #[error("Failed to read update descriptor {path}: {error}")]
    Read {
        /// Path to the descriptor
        path: PathBuf,
        /// The underlying I/O error
        error: std::io::Error,
    },

    /// Descriptor is not well-formed XML
    #[error("Failed to parse update descriptor {path}: {error}")]
    Parse {
        /// Path to the descriptor
        path: PathBuf,
        /// The underlying XML error
        error: XmlError,
    },

    /// Descriptor lacks a node the publish needs to update
    #[error("Update descriptor has no <{element}> element")]
    MissingElement {
        /// Qualified element name
        element: String,
    },

    /// Descriptor could not be serialized
    #[error("Failed to serialize update descriptor: {0}")]
    Serialize(#[from] XmlError),

    /// Final write of the descriptor failed
    #[error("Failed to write update descriptor {path}: {error}")]
    Persist {
        /// Path to the descriptor
        path: PathBuf,
        /// The underlying I/O error
        error: std::io::Error,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl ReleaseError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Config(ConfigError::Read { path, .. }) => vec![
                format!("Create {} or pass --config <path>", path.display()),
            ],
            ReleaseError::Config(ConfigError::Missing { field }) if field == "user.pass" => vec![
                "Set [user] pass in the configuration file".to_string(),
                "Or export XPI_NIGHTLY_PASSWORD or GITHUB_TOKEN".to_string(),
            ],
            ReleaseError::Git(GitError::GitNotFound) => vec![
                "Install git and make sure it is on PATH".to_string(),
            ],
            ReleaseError::Git(GitError::Timeout { .. }) => vec![
                "Check network connectivity to the remote".to_string(),
                "Raise [options] git_timeout_secs for slow remotes".to_string(),
            ],
            ReleaseError::GitHub(GitHubError::UnexpectedStatus { status: 401, .. })
            | ReleaseError::GitHub(GitHubError::UnexpectedStatus { status: 403, .. }) => vec![
                "Verify the [user] credentials have write access to the target repository"
                    .to_string(),
            ],
            ReleaseError::Descriptor(DescriptorError::Persist { path, .. }) => vec![
                "The release is live; only the update descriptor is stale".to_string(),
                format!(
                    "Make {} writable, then add the em:updateHash and em:updateLink values \
                     logged above to each target application block",
                    path.display()
                ),
                "Re-running with --force publishes a new nightly under a new tag and release; \
                 it does not retry this descriptor update"
                    .to_string(),
            ],
            ReleaseError::Cli(_) => vec!["Run xpi_nightly --help for usage".to_string()],
            ReleaseError::RollbackIncomplete { .. } => vec![
                "Inspect the remote releases page and delete the orphaned release by hand"
                    .to_string(),
                "Remove any leftover nightly tag with: git tag -d <tag>".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Whether the remote publish had already completed when this error occurred
    pub fn is_post_publish(&self) -> bool {
        matches!(self, ReleaseError::Descriptor(DescriptorError::Persist { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_failure_suggests_manual_descriptor_update() {
        let error = ReleaseError::Descriptor(DescriptorError::Persist {
            path: PathBuf::from("/site/update.rdf"),
            error: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        });
        assert!(error.is_post_publish());

        let suggestions = error.recovery_suggestions();
        assert!(suggestions.iter().any(|s| s.contains("/site/update.rdf")
            && s.contains("em:updateHash")
            && s.contains("em:updateLink")));
        assert!(
            suggestions
                .iter()
                .filter(|s| s.contains("--force"))
                .all(|s| s.contains("new tag") && s.contains("does not retry")),
            "--force is never offered as a descriptor retry"
        );
    }

    #[test]
    fn test_cli_error_points_at_help() {
        let error = ReleaseError::from(CliError::InvalidArguments {
            reason: "--config must not be empty".to_string(),
        });
        assert_eq!(error.to_string(), "CLI error: Invalid arguments: --config must not be empty");
        assert!(!error.is_post_publish());
        assert!(error.recovery_suggestions()[0].contains("--help"));
    }
}
