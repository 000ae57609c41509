//! Nightly version identity.
//!
//! A nightly build is identified by the moment it was built and the source
//! revision it was built from. Both are folded into the tag name, the tag
//! message and the suffix appended to the manifest version.

use crate::error::{GitError, Result};
use chrono::NaiveDateTime;

/// Number of revision characters carried in the version suffix
pub const REVISION_LENGTH: usize = 8;

/// Tag, message and version suffix of one nightly build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionIdentity {
    /// Version marker name, e.g. `nightly-2024-01-02-0304`
    pub tag: String,
    /// Annotated tag message and release name
    pub message: String,
    /// Appended to the manifest version, e.g. `.20240102.0304.abcdef12`
    pub suffix: String,
    /// Full source revision
    pub revision: String,
}

impl VersionIdentity {
    /// Derive the identity of a build of `revision` made at `timestamp`.
    pub fn compute(display_name: &str, revision: &str, timestamp: NaiveDateTime) -> Result<Self> {
        let revision = revision.trim();
        let short = revision
            .get(..REVISION_LENGTH)
            .filter(|short| short.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| GitError::InvalidOutput {
                reason: format!("'{revision}' is not a commit id"),
            })?;

        Ok(Self {
            tag: timestamp.format("nightly-%Y-%m-%d-%H%M").to_string(),
            message: format!(
                "{display_name} nightly - {}",
                timestamp.format("%Y-%m-%d %H:%M")
            ),
            suffix: format!("{}.{short}", timestamp.format(".%Y%m%d.%H%M")),
            revision: revision.to_string(),
        })
    }

    /// Short form of the revision used in the suffix
    pub fn short_revision(&self) -> &str {
        &self.revision[..REVISION_LENGTH]
    }
}

/// Source of the build timestamp
pub trait Clock {
    /// Current local wall-clock time
    fn now(&self) -> NaiveDateTime;
}

/// Local system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|date| date.and_hms_opt(3, 4, 0))
            .expect("valid timestamp")
    }

    #[test]
    fn test_compute_identity() {
        let identity =
            VersionIdentity::compute("My Extension", "abcdef1234567890", timestamp()).unwrap();

        assert_eq!(identity.tag, "nightly-2024-01-02-0304");
        assert_eq!(identity.message, "My Extension nightly - 2024-01-02 03:04");
        assert_eq!(identity.suffix, ".20240102.0304.abcdef12");
        assert_eq!(identity.short_revision(), "abcdef12");
    }

    #[test]
    fn test_revision_with_trailing_newline() {
        let identity =
            VersionIdentity::compute("x", "0123456789abcdef\n", timestamp()).unwrap();
        assert_eq!(identity.revision, "0123456789abcdef");
    }

    #[test]
    fn test_short_revision_rejected() {
        let err = VersionIdentity::compute("x", "abc", timestamp()).unwrap_err();
        assert!(err.to_string().contains("not a commit id"));
    }

    #[test]
    fn test_fixed_clock() {
        assert_eq!(FixedClock(timestamp()).now(), timestamp());
    }
}
