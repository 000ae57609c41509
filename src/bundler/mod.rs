//! XPI artifact bundling.
//!
//! Turns an extension packaging directory into a single in-memory XPI whose
//! `install.rdf` carries the nightly version and update URL. While the manifest
//! is patched, its identity, version and compatibility blocks are mirrored into
//! the [`UpdateDescriptor`](crate::descriptor::UpdateDescriptor).
//!
//! # Integration
//!
//! ```no_run
//! use std::path::Path;
//! use xpi_nightly::bundler::{Artifact, build_xpi};
//! use xpi_nightly::descriptor::UpdateDescriptor;
//!
//! let mut descriptor = UpdateDescriptor::open(Path::new("update.rdf"), None)?;
//! let bytes = build_xpi(
//!     Path::new("extension"),
//!     "https://example.org/update.rdf",
//!     ".20240102.0304.abcdef12",
//!     &mut descriptor,
//! )?;
//! let artifact = Artifact::new("extension", "nightly-2024-01-02-0304", bytes);
//! println!("{} {}", artifact.file_name, artifact.content_hash());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

mod builder;
mod error;
mod patch;

// Public re-exports
pub use builder::{STORED_EXTENSION, XpiBuilder, build_xpi, compression_for};
pub use error::{Context, Error, ErrorExt, Result};
pub use patch::{MANIFEST_FILE, patch_manifest};

use bytes::Bytes;

/// A built XPI ready for upload.
///
/// The content is reference counted, so handing it to the uploader does not
/// copy the archive.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Asset file name, `<repo>-<tag>.xpi`
    pub file_name: String,

    /// Archive bytes
    pub content: Bytes,
}

impl Artifact {
    /// Name and wrap archive bytes built for `tag` of `repo`
    pub fn new(repo: &str, tag: &str, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: format!("{repo}-{tag}.xpi"),
            content: content.into(),
        }
    }

    /// Archive size in bytes
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// `sha256:<hex>` digest of the archive
    pub fn content_hash(&self) -> String {
        crate::descriptor::content_hash(&self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_name() {
        let artifact = Artifact::new("myext", "nightly-2024-01-02-0304", vec![1, 2, 3]);
        assert_eq!(artifact.file_name, "myext-nightly-2024-01-02-0304.xpi");
        assert_eq!(artifact.size(), 3);
        assert!(artifact.content_hash().starts_with("sha256:"));
    }
}
