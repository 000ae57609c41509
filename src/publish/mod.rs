//! Nightly publish transaction.
//!
//! [`Publisher::publish`] runs the whole nightly release:
//!
//! 1. skip when HEAD is already tagged (unless forced)
//! 2. derive the version identity from the clock and HEAD
//! 3. build the XPI, patching `install.rdf` into the update descriptor
//! 4. tag HEAD, replacing a stale tag of the same name
//! 5. mirror-push and wait for the host to catch up
//! 6. create the release and upload the XPI
//! 7. record hash and link in the update descriptor and persist it
//!
//! A failure in steps 5 and 6 undoes the release and the tag. A failure in
//! step 7 leaves the remote publish in place.

mod transaction;

pub use transaction::{RollbackResult, Step, Transaction};

use crate::bundler::{Artifact, build_xpi};
use crate::config::Config;
use crate::descriptor::UpdateDescriptor;
use crate::error::Result;
use crate::git::GitOperations;
use crate::github::{ReleaseHost, ReleaseRecord};
use crate::version::{Clock, SystemClock, VersionIdentity};
use std::path::PathBuf;
use std::time::Duration;

/// Everything the transaction needs to know about the target
#[derive(Clone)]
pub struct PublishSettings {
    /// Display name used in the tag message
    pub display_name: String,
    /// Repository owner on the release host
    pub owner: String,
    /// Repository name on the release host, also the asset name prefix
    pub repo: String,
    /// Directory packaged into the XPI
    pub packaging_root: PathBuf,
    /// Update URL written into `install.rdf`
    pub update_url: String,
    /// Where the update descriptor is persisted
    pub descriptor_path: PathBuf,
    /// Descriptor to start from instead of the persisted one
    pub descriptor_template: Option<PathBuf>,
    /// Authenticated mirror-push URL
    pub push_url: String,
    /// Base of asset download links
    pub download_base: String,
    /// Pause between mirror push and release creation
    pub propagation_delay: Duration,
}

impl std::fmt::Debug for PublishSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishSettings")
            .field("display_name", &self.display_name)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("packaging_root", &self.packaging_root)
            .field("update_url", &self.update_url)
            .field("descriptor_path", &self.descriptor_path)
            .field("descriptor_template", &self.descriptor_template)
            .field("download_base", &self.download_base)
            .field("propagation_delay", &self.propagation_delay)
            .finish_non_exhaustive()
    }
}

impl PublishSettings {
    /// Settings for a loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            display_name: config.target.full_name.clone(),
            owner: config.target.owner.clone(),
            repo: config.target.repo.clone(),
            packaging_root: config.packaging_root(),
            update_url: config.target.update_url.clone(),
            descriptor_path: config.target.update_rdf.clone(),
            descriptor_template: config.target.template.clone(),
            push_url: config.push_url()?,
            download_base: config.options.download_base.clone(),
            propagation_delay: config.options.propagation_delay(),
        })
    }

    /// Public download link of an uploaded asset
    pub fn download_url(&self, tag: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{}/releases/download/{}/{}",
            self.download_base.trim_end_matches('/'),
            self.owner,
            self.repo,
            tag,
            file_name
        )
    }
}

/// Summary of a completed publish
#[derive(Debug, Clone)]
pub struct PublishReport {
    /// Version identity of the build
    pub identity: VersionIdentity,
    /// Uploaded asset name
    pub file_name: String,
    /// Uploaded asset size in bytes
    pub size: usize,
    /// `sha256:<hex>` of the uploaded bytes
    pub content_hash: String,
    /// Public link recorded in the descriptor
    pub download_url: String,
    /// Created release
    pub release: ReleaseRecord,
    /// Persisted descriptor
    pub descriptor_path: PathBuf,
    /// Compatibility blocks that received hash and link
    pub blocks_updated: usize,
}

/// Summary of a build made with `--dry-run`
#[derive(Debug, Clone)]
pub struct DryRunReport {
    /// Version identity the build would be published under
    pub identity: VersionIdentity,
    /// Asset name it would be uploaded as
    pub file_name: String,
    /// Built size in bytes
    pub size: usize,
    /// `sha256:<hex>` of the built bytes
    pub content_hash: String,
}

/// What a publish run did
#[derive(Debug, Clone)]
pub enum PublishOutcome {
    /// HEAD was already tagged and the run was not forced; nothing was touched
    AlreadyPublished,
    /// The artifact was built but nothing was tagged, pushed or written
    DryRun(DryRunReport),
    /// A new nightly is live
    Published(PublishReport),
}

/// Publish transaction coordinator
pub struct Publisher<G, H, C = SystemClock> {
    git: G,
    host: H,
    clock: C,
    settings: PublishSettings,
}

impl<G, H> Publisher<G, H, SystemClock>
where
    G: GitOperations,
    H: ReleaseHost,
{
    /// Publisher stamping builds with the local time
    pub fn new(git: G, host: H, settings: PublishSettings) -> Self {
        Self::with_clock(git, host, SystemClock, settings)
    }
}

impl<G, H, C> Publisher<G, H, C>
where
    G: GitOperations,
    H: ReleaseHost,
    C: Clock,
{
    /// Publisher with an explicit clock
    pub fn with_clock(git: G, host: H, clock: C, settings: PublishSettings) -> Self {
        Self {
            git,
            host,
            clock,
            settings,
        }
    }

    /// Settings in use
    pub fn settings(&self) -> &PublishSettings {
        &self.settings
    }

    /// Repository provider
    pub fn git(&self) -> &G {
        &self.git
    }

    /// Release host
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Run one publish.
    ///
    /// With `force` an already tagged HEAD is published again under a new tag.
    /// With `dry_run` the run stops after building the artifact.
    pub async fn publish(&self, force: bool, dry_run: bool) -> Result<PublishOutcome> {
        if self.git.has_exact_marker().await? {
            if !force {
                log::warn!("HEAD already carries a tag, nothing to publish");
                return Ok(PublishOutcome::AlreadyPublished);
            }
            log::info!("HEAD already carries a tag, publishing anyway (--force)");
        }

        let revision = self.git.current_revision().await?;
        let identity =
            VersionIdentity::compute(&self.settings.display_name, &revision, self.clock.now())?;
        log::info!(
            "Publishing {} ({}, version suffix {})",
            identity.tag,
            identity.message,
            identity.suffix
        );

        let mut descriptor = UpdateDescriptor::open(
            &self.settings.descriptor_path,
            self.settings.descriptor_template.as_deref(),
        )?;
        let bytes = build_xpi(
            &self.settings.packaging_root,
            &self.settings.update_url,
            &identity.suffix,
            &mut descriptor,
        )?;
        let artifact = Artifact::new(&self.settings.repo, &identity.tag, bytes);

        if dry_run {
            descriptor.close();
            return Ok(PublishOutcome::DryRun(DryRunReport {
                file_name: artifact.file_name.clone(),
                size: artifact.size(),
                content_hash: artifact.content_hash(),
                identity,
            }));
        }

        if self.git.delete_marker_if_exists(&identity.tag).await? {
            log::warn!("Removed stale tag {}", identity.tag);
        }
        self.git
            .create_marker(&identity.tag, &identity.message)
            .await?;

        let mut transaction = Transaction::new();
        transaction.record_marker(identity.tag.clone());

        let release = match self
            .publish_remote(&identity, &artifact, &mut transaction)
            .await
        {
            Ok(release) => release,
            Err(cause) => {
                return Err(transaction.abort(cause, &self.git, &self.host).await);
            }
        };
        transaction.commit();

        let report = self.finalize_descriptor(descriptor, identity, &artifact, release)?;
        Ok(PublishOutcome::Published(report))
    }

    /// Push, create the release and upload the artifact, recording each success
    async fn publish_remote(
        &self,
        identity: &VersionIdentity,
        artifact: &Artifact,
        transaction: &mut Transaction,
    ) -> Result<ReleaseRecord> {
        self.git.push_mirror(&self.settings.push_url).await?;

        let delay = self.settings.propagation_delay;
        if !delay.is_zero() {
            log::debug!("Waiting {}s for the push to propagate", delay.as_secs());
            tokio::time::sleep(delay).await;
        }

        let release = self
            .host
            .create_release(&identity.tag, &identity.message)
            .await?;
        transaction.record_release(release.clone());

        self.host
            .upload_asset(&release, &artifact.file_name, artifact.content.clone())
            .await?;
        Ok(release)
    }

    /// Record hash and link of the uploaded artifact and persist the descriptor
    pub fn finalize_descriptor(
        &self,
        mut descriptor: UpdateDescriptor,
        identity: VersionIdentity,
        artifact: &Artifact,
        release: ReleaseRecord,
    ) -> Result<PublishReport> {
        let content_hash = artifact.content_hash();
        let download_url = self
            .settings
            .download_url(&identity.tag, &artifact.file_name);

        let blocks_updated = descriptor.apply_update_info(&content_hash, &download_url);
        if blocks_updated == 0 {
            log::warn!(
                "Update descriptor {} has no target application blocks",
                descriptor.path().display()
            );
        }
        if let Err(e) = descriptor.persist() {
            log::error!(
                "Update descriptor not written; record em:updateHash {content_hash} \
                 and em:updateLink {download_url} in {} by hand",
                descriptor.path().display()
            );
            return Err(e.into());
        }
        let descriptor_path = descriptor.path().to_path_buf();
        descriptor.close();

        Ok(PublishReport {
            identity,
            file_name: artifact.file_name.clone(),
            size: artifact.size(),
            content_hash,
            download_url,
            release,
            descriptor_path,
            blocks_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_url() {
        let settings = PublishSettings {
            display_name: "Ext".to_string(),
            owner: "me".to_string(),
            repo: "ext".to_string(),
            packaging_root: PathBuf::from("/src/ext"),
            update_url: "https://example.test/update.rdf".to_string(),
            descriptor_path: PathBuf::from("/site/update.rdf"),
            descriptor_template: None,
            push_url: "https://me:pw@github.com/me/ext".to_string(),
            download_base: "https://github.com/".to_string(),
            propagation_delay: Duration::ZERO,
        };
        assert_eq!(
            settings.download_url("nightly-2024-01-02-0304", "ext-nightly-2024-01-02-0304.xpi"),
            "https://github.com/me/ext/releases/download/nightly-2024-01-02-0304/ext-nightly-2024-01-02-0304.xpi"
        );
    }
}
