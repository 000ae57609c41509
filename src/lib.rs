//! # xpi_nightly
//!
//! Publishes nightly builds of a browser extension (`.xpi`) to GitHub releases
//! and keeps the `update.rdf` auto-update descriptor pointing at them.
//!
//! A publish is a transaction over two remote systems:
//!
//! - the XPI is built in memory with a nightly version patched into `install.rdf`
//! - HEAD is tagged and mirror-pushed
//! - a release is created and the XPI uploaded to it
//! - the update descriptor receives the XPI hash and download link
//!
//! A failing remote step rolls back the release and the tag.
//!
//! ## Usage
//!
//! ```bash
//! xpi_nightly                        # publish using ./xpi_nightly.toml
//! xpi_nightly --config nightly.toml  # explicit configuration
//! xpi_nightly --force                # publish even if HEAD is tagged
//! xpi_nightly --dry-run              # build only
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Core modules
pub mod bundler;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod git;
pub mod github;
pub mod publish;
pub mod rdf;
pub mod version;

// Re-export main types for public API
pub use bundler::{Artifact, build_xpi, patch_manifest};
pub use cli::Args;
pub use config::Config;
pub use descriptor::UpdateDescriptor;
pub use error::{CliError, ReleaseError, Result};
pub use git::{GitOperations, GitRepository};
pub use github::{GitHubReleaseManager, ReleaseHost, ReleaseRecord};
pub use publish::{PublishOutcome, PublishSettings, Publisher};
pub use version::{Clock, VersionIdentity};
