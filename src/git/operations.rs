//! Repository provider contract used by the publish transaction.
//!
//! The coordinator only ever talks to the working copy through this trait, so
//! the transaction can be exercised against recording doubles in tests.

use crate::error::Result;
use std::future::Future;

/// Git operations required to publish a nightly
pub trait GitOperations {
    /// Full commit id of HEAD
    fn current_revision(&self) -> impl Future<Output = Result<String>>;

    /// Whether HEAD is exactly at an annotated tag
    fn has_exact_marker(&self) -> impl Future<Output = Result<bool>>;

    /// Whether a tag named `name` exists locally
    fn marker_exists(&self, name: &str) -> impl Future<Output = Result<bool>>;

    /// Create annotated tag `name` on HEAD
    fn create_marker(&self, name: &str, message: &str) -> impl Future<Output = Result<()>>;

    /// Delete local tag `name`; fails when it does not exist
    fn delete_marker(&self, name: &str) -> impl Future<Output = Result<()>>;

    /// Mirror-push all refs to `remote_url`, overwriting the remote
    fn push_mirror(&self, remote_url: &str) -> impl Future<Output = Result<()>>;

    /// Delete local tag `name` if present.
    ///
    /// Returns whether a tag was deleted. A missing tag is not an error; any
    /// other failure is propagated.
    fn delete_marker_if_exists(&self, name: &str) -> impl Future<Output = Result<bool>> {
        async move {
            if !self.marker_exists(name).await? {
                return Ok(false);
            }
            self.delete_marker(name).await?;
            Ok(true)
        }
    }
}
