//! The `update.rdf` auto-update descriptor.
//!
//! The descriptor lives outside the working copy. It carries the extension id,
//! the latest version and, per target application, the content hash and the
//! download link of the published XPI. It is loaded once per publish, mutated
//! by the manifest patcher while the XPI is built, completed with hash and link
//! after the upload succeeded, and only then written back.

use crate::error::DescriptorError;
use crate::rdf::{Document, Element, Node};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Namespace segment of the extension urn
pub const URN_NAMESPACE: &str = "mozilla";

const TARGET_APPLICATION: &str = "em:targetApplication";
const VERSION: &str = "em:version";
const UPDATE_HASH: &str = "em:updateHash";
const UPDATE_LINK: &str = "em:updateLink";

/// Descriptor used when neither a template nor a previous descriptor exists
const SKELETON: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<RDF:RDF xmlns:RDF="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:em="http://www.mozilla.org/2004/em-rdf#">
  <RDF:Description about="urn:mozilla:extension:">
    <em:updates>
      <RDF:Seq>
        <RDF:li>
          <RDF:Description>
            <em:version></em:version>
          </RDF:Description>
        </RDF:li>
      </RDF:Seq>
    </em:updates>
  </RDF:Description>
</RDF:RDF>
"#;

type Result<T> = std::result::Result<T, DescriptorError>;

/// Parsed update descriptor bound to the path it will be persisted to
#[derive(Debug, Clone)]
pub struct UpdateDescriptor {
    path: PathBuf,
    document: Document,
}

impl UpdateDescriptor {
    /// Open the descriptor for a publish.
    ///
    /// Content comes from `template` when given, otherwise from `path` when it
    /// exists, otherwise from a built-in skeleton. It is always persisted to `path`.
    pub fn open(path: &Path, template: Option<&Path>) -> Result<Self> {
        let source = match template {
            Some(template) => Some(template),
            None if path.exists() => Some(path),
            None => None,
        };

        match source {
            Some(source) => {
                let bytes = std::fs::read(source).map_err(|error| DescriptorError::Read {
                    path: source.to_path_buf(),
                    error,
                })?;
                let document =
                    Document::parse(&bytes).map_err(|error| DescriptorError::Parse {
                        path: source.to_path_buf(),
                        error,
                    })?;
                log::debug!("Loaded update descriptor from {}", source.display());
                Ok(Self::new(path, document))
            }
            None => {
                log::info!(
                    "No update descriptor at {}, starting from an empty one",
                    path.display()
                );
                Self::parse(path, SKELETON.as_bytes())
            }
        }
    }

    /// Parse descriptor content that will be persisted to `path`
    pub fn parse(path: impl Into<PathBuf>, bytes: &[u8]) -> Result<Self> {
        let path = path.into();
        let document = Document::parse(bytes).map_err(|error| DescriptorError::Parse {
            path: path.clone(),
            error,
        })?;
        Ok(Self { path, document })
    }

    /// Wrap an already parsed document
    pub fn new(path: impl Into<PathBuf>, document: Document) -> Self {
        Self {
            path: path.into(),
            document,
        }
    }

    /// Path the descriptor is persisted to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Underlying document
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// `RDF:Description` when the root is `RDF:RDF`, plain `Description` otherwise
    pub fn description_tag(&self) -> String {
        match self.document.root().prefix() {
            Some(prefix) => format!("{prefix}:Description"),
            None => "Description".to_string(),
        }
    }

    /// Point the descriptor's identity at `urn:mozilla:extension:<id>`
    pub fn set_extension_id(&mut self, id: &str) -> Result<()> {
        let tag = self.description_tag();
        let description = self
            .document
            .root_mut()
            .find_first_mut(&tag)
            .ok_or(DescriptorError::MissingElement { element: tag })?;

        let about = description
            .attributes
            .iter()
            .map(|(key, _)| key.as_str())
            .find(|key| *key == "about" || key.ends_with(":about"))
            .unwrap_or("about")
            .to_string();
        description.set_attribute(&about, format!("urn:{URN_NAMESPACE}:extension:{id}"));
        Ok(())
    }

    /// Extension urn currently recorded
    pub fn extension_urn(&self) -> Option<String> {
        let description = self.document.root().find_first(&self.description_tag())?;
        description
            .attributes
            .iter()
            .find(|(key, _)| key == "about" || key.ends_with(":about"))
            .map(|(_, value)| value.clone())
    }

    /// Replace the text of the first `em:version`
    pub fn set_version(&mut self, version: &str) -> Result<()> {
        self.document
            .root_mut()
            .find_first_mut(VERSION)
            .ok_or_else(|| DescriptorError::MissingElement {
                element: VERSION.to_string(),
            })?
            .set_text(version);
        Ok(())
    }

    /// Text of the first `em:version`
    pub fn version(&self) -> Option<String> {
        self.document.root().find_first(VERSION).map(Element::text)
    }

    /// Copy a manifest `em:targetApplication` block next to the descriptor's version.
    ///
    /// Nested `Description` nodes are renamed into the descriptor's namespace. A block
    /// already present for the same target application id is replaced, so repeated
    /// publishes keep a single block per application.
    pub fn merge_target_application(&mut self, block: &Element) -> Result<()> {
        let mut clone = block.clone();
        clone.rename_local("Description", &self.description_tag());
        let application_id = target_application_id(&clone);

        let holder = self
            .document
            .root_mut()
            .parent_of_first_mut(VERSION)
            .ok_or_else(|| DescriptorError::MissingElement {
                element: VERSION.to_string(),
            })?;

        let existing = application_id.as_deref().and_then(|id| {
            holder.children.iter().position(|child| {
                matches!(child, Node::Element(element)
                    if element.name == TARGET_APPLICATION
                        && target_application_id(element).as_deref() == Some(id))
            })
        });

        match (existing, application_id) {
            (Some(index), Some(id)) => {
                log::debug!("Updating target application block for {id}");
                holder.children[index] = Node::Element(clone);
            }
            (_, id) => {
                log::debug!(
                    "Adding target application block for {}",
                    id.as_deref().unwrap_or("<unknown>")
                );
                holder.append_child(clone);
            }
        }
        Ok(())
    }

    /// Target application ids that have a compatibility block, in document order
    pub fn target_application_ids(&self) -> Vec<String> {
        self.document
            .root()
            .find_all(TARGET_APPLICATION)
            .into_iter()
            .filter_map(target_application_id)
            .collect()
    }

    /// Record hash and download link in every compatibility block.
    ///
    /// Previous `em:updateHash`/`em:updateLink` nodes are dropped first, so each
    /// block ends up with exactly one of each. Returns the number of blocks updated.
    pub fn apply_update_info(&mut self, content_hash: &str, download_url: &str) -> usize {
        let tag = self.description_tag();
        let mut updated = 0;
        self.document
            .root_mut()
            .for_each_named_mut(TARGET_APPLICATION, &mut |block: &mut Element| {
                block.for_each_named_mut(&tag, &mut |description: &mut Element| {
                    description.remove_all(UPDATE_HASH);
                    description.remove_all(UPDATE_LINK);
                    description.append_child(Element::with_text(UPDATE_HASH, content_hash));
                    description.append_child(Element::with_text(UPDATE_LINK, download_url));
                    updated += 1;
                });
            });
        updated
    }

    /// Canonical serialized form
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.document.to_bytes()?)
    }

    /// Overwrite the descriptor file.
    ///
    /// Content goes to a sibling temporary file first and is renamed over the
    /// target, so a failed write leaves the previous descriptor intact.
    pub fn persist(&self) -> Result<()> {
        let bytes = self.to_bytes()?;
        let persist_error = |error| DescriptorError::Persist {
            path: self.path.clone(),
            error,
        };

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "update.rdf".to_string());
        let staging = self.path.with_file_name(format!(".{file_name}.tmp"));

        std::fs::write(&staging, &bytes).map_err(persist_error)?;
        if let Err(error) = std::fs::rename(&staging, &self.path) {
            let _ = std::fs::remove_file(&staging);
            return Err(persist_error(error));
        }

        log::info!(
            "Wrote update descriptor {} ({} bytes)",
            self.path.display(),
            bytes.len()
        );
        Ok(())
    }

    /// Release the parsed document
    pub fn close(self) {
        log::debug!("Closing update descriptor {}", self.path.display());
    }
}

/// `sha256:<hex digest>` as stored in `em:updateHash`
pub fn content_hash(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

fn target_application_id(block: &Element) -> Option<String> {
    block
        .find_first("em:id")
        .map(|id| id.text().trim().to_string())
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIREFOX: &str = "{ec8030f7-c20a-464f-9b0e-13a3a9e97384}";

    fn block(id: &str, max: &str) -> Element {
        let source = format!(
            "<em:targetApplication><Description><em:id>{id}</em:id>\
             <em:minVersion>3.6</em:minVersion><em:maxVersion>{max}</em:maxVersion>\
             </Description></em:targetApplication>"
        );
        Document::parse_str(&source).expect("block").root().clone()
    }

    fn skeleton() -> UpdateDescriptor {
        UpdateDescriptor::parse("update.rdf", SKELETON.as_bytes()).expect("skeleton")
    }

    #[test]
    fn test_set_identity_and_version() {
        let mut descriptor = skeleton();
        descriptor.set_extension_id("ext@example.test").expect("id");
        descriptor.set_version("1.0.20240102.0304.abcdef12").expect("version");

        assert_eq!(
            descriptor.extension_urn().as_deref(),
            Some("urn:mozilla:extension:ext@example.test")
        );
        assert_eq!(
            descriptor.version().as_deref(),
            Some("1.0.20240102.0304.abcdef12")
        );
    }

    #[test]
    fn test_merge_renames_descriptions() {
        let mut descriptor = skeleton();
        descriptor
            .merge_target_application(&block(FIREFOX, "10.*"))
            .expect("merge");

        let merged = descriptor
            .document()
            .root()
            .find_first(TARGET_APPLICATION)
            .expect("block");
        assert!(merged.find_first("RDF:Description").is_some());
        assert!(merged.find_first("Description").is_none());
    }

    #[test]
    fn test_merge_replaces_block_for_same_application() {
        let mut descriptor = skeleton();
        descriptor
            .merge_target_application(&block(FIREFOX, "10.*"))
            .expect("first");
        descriptor
            .merge_target_application(&block(FIREFOX, "11.*"))
            .expect("second");
        descriptor
            .merge_target_application(&block("{seamonkey}", "2.*"))
            .expect("third");

        assert_eq!(
            descriptor.target_application_ids(),
            vec![FIREFOX.to_string(), "{seamonkey}".to_string()]
        );
        let max = descriptor
            .document()
            .root()
            .find_first("em:maxVersion")
            .expect("max");
        assert_eq!(max.text(), "11.*");
    }

    #[test]
    fn test_apply_update_info_replaces_previous_values() {
        let mut descriptor = skeleton();
        descriptor
            .merge_target_application(&block(FIREFOX, "10.*"))
            .expect("merge");

        assert_eq!(descriptor.apply_update_info("sha256:old", "https://old"), 1);
        assert_eq!(descriptor.apply_update_info("sha256:new", "https://new"), 1);

        let hashes = descriptor.document().root().find_all(UPDATE_HASH);
        assert_eq!(hashes.len(), 1);
        assert_eq!(hashes[0].text(), "sha256:new");
        let links = descriptor.document().root().find_all(UPDATE_LINK);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text(), "https://new");
    }

    #[test]
    fn test_content_hash_format() {
        assert_eq!(
            content_hash(b""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_open_without_file_uses_skeleton_and_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("update.rdf");

        let mut descriptor = UpdateDescriptor::open(&path, None).expect("open");
        descriptor.set_version("2.0").expect("version");
        descriptor.persist().expect("persist");
        descriptor.close();

        let reopened = UpdateDescriptor::open(&path, None).expect("reopen");
        assert_eq!(reopened.version().as_deref(), Some("2.0"));
        assert!(!dir.path().join(".update.rdf.tmp").exists());
    }

    #[test]
    fn test_persist_into_missing_directory_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let descriptor = UpdateDescriptor::parse(
            dir.path().join("missing").join("update.rdf"),
            SKELETON.as_bytes(),
        )
        .expect("parse");

        let err = descriptor.persist().expect_err("must fail");
        assert!(matches!(err, DescriptorError::Persist { .. }));
    }
}
