//! [`GitOperations`] backed by the `git` command line.

use crate::error::{GitError, Result};
use crate::git::{GitCommand, GitOperations};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Stderr fragments `git describe --exact-match` prints when HEAD is untagged
const NOT_TAGGED: &[&str] = &["no tag exactly matches", "No names found", "cannot describe"];

/// A local working copy
#[derive(Debug, Clone)]
pub struct GitRepository {
    work_dir: PathBuf,
    git: PathBuf,
    timeout: Duration,
}

impl GitRepository {
    /// Open the working copy at `path`.
    ///
    /// Resolves `git` on PATH and checks that `path` is inside a work tree.
    pub async fn open(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let work_dir = path.as_ref().to_path_buf();
        let git = which::which("git").map_err(|_| GitError::GitNotFound)?;

        if !work_dir.is_dir() {
            return Err(GitError::NotRepository { path: work_dir }.into());
        }

        let repository = Self {
            work_dir,
            git,
            timeout,
        };
        let inside = repository
            .command()
            .args(["rev-parse", "--is-inside-work-tree"])
            .execute_raw()
            .await?;
        if !inside.success || inside.stdout.trim() != "true" {
            return Err(GitError::NotRepository {
                path: repository.work_dir,
            }
            .into());
        }

        log::debug!("Opened git working copy {}", repository.work_dir.display());
        Ok(repository)
    }

    /// Working copy root
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn command(&self) -> GitCommand {
        GitCommand::new()
            .program(&self.git)
            .current_dir(&self.work_dir)
            .with_timeout(Some(self.timeout))
    }
}

impl GitOperations for GitRepository {
    async fn current_revision(&self) -> Result<String> {
        let revision = self
            .command()
            .args(["rev-parse", "HEAD"])
            .execute_stdout()
            .await?;
        if revision.is_empty() {
            return Err(GitError::InvalidOutput {
                reason: "git rev-parse HEAD printed nothing".to_string(),
            }
            .into());
        }
        Ok(revision)
    }

    async fn has_exact_marker(&self) -> Result<bool> {
        let output = self
            .command()
            .args(["describe", "--exact-match", "HEAD"])
            .execute_raw()
            .await?;

        if output.success {
            log::debug!("HEAD is tagged {}", output.stdout.trim());
            return Ok(true);
        }
        if NOT_TAGGED.iter().any(|needle| output.stderr.contains(needle)) {
            return Ok(false);
        }
        Err(GitError::CommandFailed {
            operation: "describe".to_string(),
            stderr: output.stderr.trim().to_string(),
        }
        .into())
    }

    async fn marker_exists(&self, name: &str) -> Result<bool> {
        let output = self
            .command()
            .args(["rev-parse", "--quiet", "--verify"])
            .arg(format!("refs/tags/{name}"))
            .execute_raw()
            .await?;
        Ok(output.success)
    }

    async fn create_marker(&self, name: &str, message: &str) -> Result<()> {
        self.command()
            .args(["tag", "-a", "-m", message, name])
            .execute_success()
            .await?;
        log::info!("Created tag {name}");
        Ok(())
    }

    async fn delete_marker(&self, name: &str) -> Result<()> {
        self.command()
            .args(["tag", "-d", name])
            .execute_success()
            .await?;
        log::info!("Deleted tag {name}");
        Ok(())
    }

    async fn push_mirror(&self, remote_url: &str) -> Result<()> {
        let password = url::Url::parse(remote_url)
            .ok()
            .and_then(|url| url.password().map(str::to_string))
            .unwrap_or_default();
        let command = self
            .command()
            .args(["push", "--mirror", "--force", remote_url])
            .with_secret(password);

        log::info!("Pushing: git {}", command.display());
        command.execute_success().await?;
        Ok(())
    }
}
