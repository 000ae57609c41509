//! Error types for XPI assembly.
//!
//! Provides contextual error chaining and filesystem errors that carry the path
//! being accessed, so a failed build names the exact member that broke it.
//!
//! # Example
//!
//! ```no_run
//! # use std::path::Path;
//! use xpi_nightly::bundler::{ErrorExt, Result};
//!
//! fn read_member(path: &Path) -> Result<Vec<u8>> {
//!     std::fs::read(path).fs_context("reading artifact member", path)
//! }
//! ```

use crate::error::{DescriptorError, XmlError};
use std::{
    fmt::Display,
    io,
    path::{self, PathBuf},
};
use thiserror::Error as DeriveError;

/// Errors returned while building an XPI.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// File system error with path context.
    ///
    /// Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "reading artifact member")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// Generic I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Error walking the packaging directory.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripError(#[from] path::StripPrefixError),

    /// ZIP archive creation error.
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    /// `install.rdf` is not well-formed.
    #[error("install.rdf: {0}")]
    Manifest(#[from] XmlError),

    /// The update descriptor could not take the manifest's data.
    #[error("{0}")]
    Descriptor(#[from] DescriptorError),

    /// The packaging root has no manifest.
    #[error("no install.rdf found in {root}")]
    ManifestNotFound {
        /// Packaging root that was searched
        root: PathBuf,
    },

    /// The manifest lacks an element the patcher needs.
    #[error("install.rdf has no <{element}> element")]
    MissingElement {
        /// Qualified element name
        element: &'static str,
    },

    /// A member path cannot be represented in the archive.
    #[error("path is not valid UTF-8: {0:?}")]
    NonUtf8Path(PathBuf),
}

/// Convenient type alias of Result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait adding context to errors.
pub trait Context<T> {
    /// Wrap the error with a lazily built context message.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

/// Filesystem errors with the offending path attached.
pub trait ErrorExt<T> {
    /// Map an I/O error to [`Error::Fs`].
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}
