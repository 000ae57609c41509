//! In-memory XPI assembly.
//!
//! The builder walks the packaging root, sorts members by (parent directory,
//! file name) and writes them into a zip held in memory:
//!
//! - `*.png` members are stored uncompressed
//! - `install.rdf` at the root is replaced by its patched form
//! - everything else is deflated
//!
//! Members carry a fixed timestamp and permissions, so two builds of an
//! unchanged tree with the same version produce identical bytes.

use crate::bundler::error::{Context, Error, ErrorExt, Result};
use crate::bundler::patch::{MANIFEST_FILE, patch_manifest};
use crate::descriptor::UpdateDescriptor;
use std::ffi::OsString;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Extension of members stored without compression
pub const STORED_EXTENSION: &str = "png";

/// Directories never packaged
const VCS_DIRECTORIES: &[&str] = &[".git", ".hg", ".svn"];

/// Builds one XPI from a packaging root.
#[derive(Debug, Clone)]
pub struct XpiBuilder {
    root: PathBuf,
    update_url: String,
    version_suffix: String,
}

impl XpiBuilder {
    /// Create a builder for `root`
    pub fn new(
        root: impl Into<PathBuf>,
        update_url: impl Into<String>,
        version_suffix: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            update_url: update_url.into(),
            version_suffix: version_suffix.into(),
        }
    }

    /// Packaging root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Member paths relative to the root, in archive order
    pub fn members(&self) -> Result<Vec<PathBuf>> {
        let mut members = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| !is_vcs_directory(entry));

        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() {
                members.push(entry.path().strip_prefix(&self.root)?.to_path_buf());
            }
        }

        members.sort_by_cached_key(|member| sort_key(member));
        Ok(members)
    }

    /// Build the archive, patching the manifest into `descriptor` along the way.
    ///
    /// Any unreadable member aborts the build; no partial archive is returned.
    pub fn build(&self, descriptor: &mut UpdateDescriptor) -> Result<Vec<u8>> {
        let members = self.members()?;
        if !members.iter().any(|member| is_manifest(member)) {
            return Err(Error::ManifestNotFound {
                root: self.root.clone(),
            });
        }

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for member in &members {
            let path = self.root.join(member);
            let name = member_name(member)?;
            let method = compression_for(member);

            let contents = std::fs::read(&path).fs_context("reading artifact member", &path)?;
            let contents = if is_manifest(member) {
                patch_manifest(
                    &contents,
                    &self.update_url,
                    &self.version_suffix,
                    descriptor,
                )
                .with_context(|| format!("patching {}", path.display()))?
            } else {
                contents
            };

            log::debug!("Adding {name} ({} bytes, {method:?})", contents.len());
            zip.start_file(name, member_options(method))?;
            zip.write_all(&contents)?;
        }

        let archive = zip.finish()?.into_inner();
        log::info!(
            "Built XPI from {} ({} members, {} bytes)",
            self.root.display(),
            members.len(),
            archive.len()
        );
        Ok(archive)
    }
}

/// Build an XPI from `root` in one call
pub fn build_xpi(
    root: &Path,
    update_url: &str,
    version_suffix: &str,
    descriptor: &mut UpdateDescriptor,
) -> Result<Vec<u8>> {
    XpiBuilder::new(root, update_url, version_suffix).build(descriptor)
}

/// Compression used for a member
pub fn compression_for(member: &Path) -> CompressionMethod {
    let stored = member
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case(STORED_EXTENSION));
    if stored {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Deflated
    }
}

fn member_options(method: CompressionMethod) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

fn sort_key(member: &Path) -> (PathBuf, OsString) {
    let parent = member.parent().map(Path::to_path_buf).unwrap_or_default();
    let name = member
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    (parent, name)
}

fn is_manifest(member: &Path) -> bool {
    member == Path::new(MANIFEST_FILE)
}

fn is_vcs_directory(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| VCS_DIRECTORIES.contains(&name))
}

/// Archive member name: `/`-separated path relative to the packaging root
fn member_name(member: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in member.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| Error::NonUtf8Path(member.to_path_buf()))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_is_stored() {
        assert_eq!(
            compression_for(Path::new("skin/icon.png")),
            CompressionMethod::Stored
        );
        assert_eq!(
            compression_for(Path::new("ICON.PNG")),
            CompressionMethod::Stored
        );
        assert_eq!(
            compression_for(Path::new("chrome.manifest")),
            CompressionMethod::Deflated
        );
    }

    #[test]
    fn test_sort_key_orders_by_parent_then_name() {
        let mut members = vec![
            PathBuf::from("content/b.js"),
            PathBuf::from("install.rdf"),
            PathBuf::from("content/a.js"),
            PathBuf::from("chrome.manifest"),
        ];
        members.sort_by_cached_key(|member| sort_key(member));
        assert_eq!(
            members,
            vec![
                PathBuf::from("chrome.manifest"),
                PathBuf::from("install.rdf"),
                PathBuf::from("content/a.js"),
                PathBuf::from("content/b.js"),
            ]
        );
    }

    #[test]
    fn test_member_name_uses_forward_slashes() {
        let member: PathBuf = ["content", "overlay.js"].iter().collect();
        assert_eq!(member_name(&member).expect("utf-8"), "content/overlay.js");
    }
}
