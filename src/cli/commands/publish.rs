//! Publish command implementation.

use crate::cli::RuntimeConfig;
use crate::config::Config;
use crate::error::Result;
use crate::git::GitRepository;
use crate::github::{GitHubReleaseConfig, GitHubReleaseManager};
use crate::publish::{PublishOutcome, PublishSettings, Publisher};

/// Load configuration and run one publish
pub(super) async fn execute_publish(config: &RuntimeConfig) -> Result<i32> {
    let settings_file = Config::load(&config.config_path)?;
    config.verbose_println(&format!(
        "Loaded configuration from {}",
        config.config_path.display()
    ));

    let settings = PublishSettings::from_config(&settings_file)?;
    let git = GitRepository::open(&settings_file.source.repo, settings_file.options.git_timeout())
        .await?;
    let host = GitHubReleaseManager::new(GitHubReleaseConfig {
        owner: settings_file.target.owner.clone(),
        repo: settings_file.target.repo.clone(),
        api_base: settings_file.options.api_base.clone(),
        user: settings_file.user.name.clone(),
        password: settings_file.password().to_string(),
        timeout: settings_file.options.http_timeout(),
    })?;

    let _ = config.output().progress(&format!(
        "Publishing {}/{} from {}",
        settings.owner,
        settings.repo,
        settings.packaging_root.display()
    ));

    let publisher = Publisher::new(git, host, settings);
    match publisher.publish(config.force, config.dry_run).await? {
        PublishOutcome::AlreadyPublished => {
            config.warning_println("HEAD is already tagged; nothing to publish (use --force to override)");
        }
        PublishOutcome::DryRun(report) => {
            config.success_println(&format!(
                "Built {} ({} bytes), not published",
                report.file_name, report.size
            ));
            config.indent(&format!("Tag:     {}", report.identity.tag));
            config.indent(&format!("Version: *{}", report.identity.suffix));
            config.indent(&format!("Hash:    {}", report.content_hash));
        }
        PublishOutcome::Published(report) => {
            config.success_println(&format!("Published {}", report.identity.message));
            config.indent(&format!("Tag:        {}", report.identity.tag));
            config.indent(&format!("Release:    {}", report.release.id));
            config.indent(&format!(
                "Asset:      {} ({} bytes)",
                report.file_name, report.size
            ));
            config.indent(&format!("Hash:       {}", report.content_hash));
            config.indent(&format!("Download:   {}", report.download_url));
            config.indent(&format!(
                "Descriptor: {} ({} block(s))",
                report.descriptor_path.display(),
                report.blocks_updated
            ));
        }
    }

    Ok(0)
}
