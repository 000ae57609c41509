//! GitHub integration for release operations

mod release_manager;

pub use release_manager::{
    DEFAULT_API_BASE, DEFAULT_HTTP_TIMEOUT, GitHubReleaseConfig, GitHubReleaseManager,
    XPI_CONTENT_TYPE,
};

use crate::error::Result;
use bytes::Bytes;
use std::future::Future;

/// A release created on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    /// Host-assigned release id
    pub id: u64,
    /// Asset upload endpoint, without URI template suffix
    pub upload_url: String,
}

/// Release hosting API used by the publish transaction
pub trait ReleaseHost {
    /// Create a release for an already pushed tag
    fn create_release(&self, tag: &str, name: &str) -> impl Future<Output = Result<ReleaseRecord>>;

    /// Attach the artifact to `release`
    fn upload_asset(
        &self,
        release: &ReleaseRecord,
        file_name: &str,
        content: Bytes,
    ) -> impl Future<Output = Result<()>>;

    /// Delete `release` together with its assets
    fn delete_release(&self, release: &ReleaseRecord) -> impl Future<Output = Result<()>>;
}
