//! Ledger of remote side effects and their compensations.
//!
//! Each forward step that leaves state behind records itself here. On failure
//! the ledger is unwound in reverse creation order, so the release is deleted
//! before the tag it points at.

use crate::error::ReleaseError;
use crate::git::GitOperations;
use crate::github::{ReleaseHost, ReleaseRecord};

/// A side effect that can be compensated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Local annotated tag
    Marker(String),
    /// Release on the host
    Release(ReleaseRecord),
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Marker(name) => write!(f, "tag {name}"),
            Step::Release(release) => write!(f, "release {}", release.id),
        }
    }
}

/// Outcome of unwinding a transaction
#[derive(Debug, Clone, Default)]
pub struct RollbackResult {
    /// Compensations that succeeded, in execution order
    pub rolled_back: Vec<String>,
    /// Compensations that failed
    pub warnings: Vec<String>,
}

impl RollbackResult {
    /// Whether every compensation succeeded
    pub fn fully_successful(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Side effects of an in-flight publish
#[derive(Debug, Default)]
pub struct Transaction {
    steps: Vec<Step>,
}

impl Transaction {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a created tag
    pub fn record_marker(&mut self, name: impl Into<String>) {
        self.steps.push(Step::Marker(name.into()));
    }

    /// Record a created release
    pub fn record_release(&mut self, release: ReleaseRecord) {
        self.steps.push(Step::Release(release));
    }

    /// Forget recorded steps once the remote publish is complete
    pub fn commit(self) -> Vec<Step> {
        self.steps
    }

    /// Compensate every recorded step, newest first.
    ///
    /// Failures are logged and collected; every remaining compensation still runs.
    pub async fn rollback<G, H>(self, git: &G, host: &H) -> RollbackResult
    where
        G: GitOperations,
        H: ReleaseHost,
    {
        let mut result = RollbackResult::default();
        for step in self.steps.into_iter().rev() {
            log::warn!("Rolling back {step}");
            let outcome = match &step {
                Step::Release(release) => host.delete_release(release).await,
                Step::Marker(name) => git.delete_marker(name).await,
            };
            match outcome {
                Ok(()) => result.rolled_back.push(step.to_string()),
                Err(e) => {
                    log::error!("Failed to roll back {step}: {e}");
                    result.warnings.push(format!("{step}: {e}"));
                }
            }
        }
        result
    }

    /// Roll back and produce the error to report for `cause`.
    ///
    /// `cause` is returned unchanged when every compensation succeeded.
    pub async fn abort<G, H>(self, cause: ReleaseError, git: &G, host: &H) -> ReleaseError
    where
        G: GitOperations,
        H: ReleaseHost,
    {
        log::error!("Publish failed: {cause}");
        let result = self.rollback(git, host).await;
        if !result.rolled_back.is_empty() {
            log::info!("Rolled back {}", result.rolled_back.join(", "));
        }
        if result.fully_successful() {
            cause
        } else {
            ReleaseError::RollbackIncomplete {
                source: Box::new(cause),
                rollback_warnings: result.warnings,
            }
        }
    }
}
