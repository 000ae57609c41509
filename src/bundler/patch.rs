//! `install.rdf` patching for nightly builds.
//!
//! The manifest inside every nightly XPI must announce the nightly version and
//! point at the nightly update descriptor. While rewriting it, the patcher feeds
//! the extension id, the full version and the compatibility blocks into the
//! update descriptor, which is completed after the upload.
//!
//! # Steps
//!
//! 1. `em:id` becomes the descriptor identity `urn:mozilla:extension:<id>`
//! 2. the version suffix is appended to `em:version`, and copied to the descriptor
//! 3. every `em:targetApplication` is cloned into the descriptor
//! 4. `em:updateKey` is removed (a republished XPI invalidates key pinning)
//! 5. `em:updateURL` is created or overwritten with the nightly update URL

use crate::bundler::error::{Error, Result};
use crate::descriptor::UpdateDescriptor;
use crate::rdf::{Document, Element};

/// File name of the manifest at the packaging root
pub const MANIFEST_FILE: &str = "install.rdf";

const TARGET_APPLICATION: &str = "em:targetApplication";
const ID: &str = "em:id";
const VERSION: &str = "em:version";
const UPDATE_KEY: &str = "em:updateKey";
const UPDATE_URL: &str = "em:updateURL";

/// Patch manifest bytes and mirror its data into the update descriptor.
///
/// Returns the serialized manifest that goes into the XPI. On error the
/// descriptor may be partially updated; callers discard it in that case.
pub fn patch_manifest(
    source: &[u8],
    update_url: &str,
    version_suffix: &str,
    descriptor: &mut UpdateDescriptor,
) -> Result<Vec<u8>> {
    let mut manifest = Document::parse(source)?;
    let root = manifest.root_mut();

    let extension_id = root
        .find_first_outside(ID, TARGET_APPLICATION)
        .map(|id| id.text().trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or(Error::MissingElement { element: ID })?;
    descriptor.set_extension_id(&extension_id)?;

    let version_node = root
        .find_first_outside_mut(VERSION, TARGET_APPLICATION)
        .ok_or(Error::MissingElement { element: VERSION })?;
    let version = format!("{}{}", version_node.text().trim(), version_suffix);
    version_node.set_text(version.as_str());
    descriptor.set_version(&version)?;

    for block in root.find_all(TARGET_APPLICATION) {
        descriptor.merge_target_application(block)?;
    }

    let removed = root.remove_all(UPDATE_KEY);
    if removed > 0 {
        log::debug!("Removed {removed} {UPDATE_KEY} node(s) from {MANIFEST_FILE}");
    }

    match root.find_first_mut(UPDATE_URL) {
        Some(node) => node.set_text(update_url),
        None => {
            let holder = root
                .parent_of_first_outside_mut(ID, TARGET_APPLICATION)
                .ok_or(Error::MissingElement { element: ID })?;
            holder.append_child_indented(Element::with_text(UPDATE_URL, update_url));
        }
    }

    log::info!("Patched {MANIFEST_FILE}: {extension_id} {version}");
    Ok(manifest.to_bytes()?)
}
