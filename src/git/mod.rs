//! Git operations for the publish transaction.
//!
//! Tags and pushes go through the `git` executable, driven by [`GitCommand`]
//! with per-command timeouts. The transaction depends only on the
//! [`GitOperations`] trait.

mod command;
mod operations;
mod repository;

pub use command::{DEFAULT_GIT_TIMEOUT, GitCommand, GitCommandOutput};
pub use operations::GitOperations;
pub use repository::GitRepository;
