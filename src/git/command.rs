//! Builder for `git` subprocess invocations.
//!
//! Every command runs with `-C <dir>` instead of changing the process working
//! directory, under a timeout, with `LC_ALL=C` so that error output can be
//! matched. Registered secrets are masked in logs and in returned errors.

use crate::error::GitError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Default timeout for a single git command
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(300);

const REDACTED: &str = "***";

/// Fluent builder for one git command.
///
/// ```no_run
/// # use xpi_nightly::git::GitCommand;
/// # async fn example() -> Result<(), xpi_nightly::error::GitError> {
/// let head = GitCommand::new()
///     .current_dir("/path/to/repo")
///     .args(["rev-parse", "HEAD"])
///     .execute_stdout()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: PathBuf,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    timeout_duration: Option<Duration>,
    secrets: Vec<String>,
}

/// Captured output of a finished git command
#[derive(Debug, Clone)]
pub struct GitCommandOutput {
    /// Whether git exited with status 0
    pub success: bool,
    /// Standard output
    pub stdout: String,
    /// Standard error, secrets masked
    pub stderr: String,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
            args: Vec::new(),
            current_dir: None,
            env_vars: vec![("LC_ALL".to_string(), "C".to_string())],
            timeout_duration: Some(DEFAULT_GIT_TIMEOUT),
            secrets: Vec::new(),
        }
    }
}

impl GitCommand {
    /// New command using `git` from PATH
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific git executable
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Run against the repository at `dir`
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the git process
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Override the timeout (`None` waits forever)
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Mask `secret` wherever the command line or its output is reported
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    /// Git subcommand, used to label errors
    pub fn operation(&self) -> String {
        self.args
            .first()
            .cloned()
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Command line as it may appear in logs
    pub fn display(&self) -> String {
        self.redact(&self.full_args().join(" "))
    }

    fn full_args(&self) -> Vec<String> {
        let mut full_args = Vec::with_capacity(self.args.len() + 2);
        if let Some(dir) = &self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        full_args
    }

    fn redact(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |text, secret| text.replace(secret, REDACTED))
    }

    /// Run the command and capture its output whatever the exit status.
    pub async fn execute_raw(self) -> Result<GitCommandOutput, GitError> {
        let start = std::time::Instant::now();
        let operation = self.operation();
        let mut cmd = Command::new(&self.program);
        cmd.args(self.full_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        log::debug!("Executing: git {}", self.display());

        let output = match self.timeout_duration {
            Some(duration) => match timeout(duration, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    log::warn!(
                        "git {} timed out after {}s",
                        operation,
                        duration.as_secs()
                    );
                    return Err(GitError::Timeout {
                        operation,
                        seconds: duration.as_secs(),
                    });
                }
            },
            None => cmd.output().await,
        }
        .map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                GitError::GitNotFound
            } else {
                GitError::Spawn {
                    operation: operation.clone(),
                    error,
                }
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = self.redact(&String::from_utf8_lossy(&output.stderr));
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 {
            log::debug!("git {} took {}ms", operation, elapsed.as_millis());
        }

        Ok(GitCommandOutput {
            success: output.status.success(),
            stdout,
            stderr,
        })
    }

    /// Run the command, failing unless git exits with status 0
    pub async fn execute(self) -> Result<GitCommandOutput, GitError> {
        let operation = self.operation();
        let output = self.execute_raw().await?;
        if !output.success {
            let stderr = output.stderr.trim().to_string();
            log::debug!("git {operation} failed: {stderr}");
            return Err(GitError::CommandFailed { operation, stderr });
        }
        if !output.stderr.trim().is_empty() {
            log::debug!("{}", output.stderr.trim());
        }
        Ok(output)
    }

    /// Run the command and return trimmed stdout
    pub async fn execute_stdout(self) -> Result<String, GitError> {
        Ok(self.execute().await?.stdout.trim().to_string())
    }

    /// Run the command for its side effect
    pub async fn execute_success(self) -> Result<(), GitError> {
        self.execute().await.map(|_| ())
    }
}
