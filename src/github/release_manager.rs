//! GitHub Release management over the REST API

use crate::error::{GitHubError, Result};
use crate::github::{ReleaseHost, ReleaseRecord};
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Public GitHub API endpoint
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Request timeout used when none is configured
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Content type of uploaded XPI assets
pub const XPI_CONTENT_TYPE: &str = "application/x-xpinstall";

const RELEASE_BODY: &str = "Automated build";

/// Configuration for GitHub releases
#[derive(Debug, Clone)]
pub struct GitHubReleaseConfig {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// API base URL, without trailing slash
    pub api_base: String,
    /// Account used for basic authentication
    pub user: String,
    /// Password or personal access token
    pub password: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for GitHubReleaseConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            user: String::new(),
            password: String::new(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateReleaseRequest<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedRelease {
    id: u64,
    upload_url: String,
}

/// GitHub release manager
#[derive(Debug, Clone)]
pub struct GitHubReleaseManager {
    /// HTTP client
    client: Client,
    /// Configuration
    config: GitHubReleaseConfig,
}

impl GitHubReleaseManager {
    /// Create new GitHub release manager
    pub fn new(config: GitHubReleaseConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(GitHubError::Transport)?;

        Ok(Self { client, config })
    }

    /// Repository slug, `owner/repo`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.config.owner, self.config.repo)
    }

    fn releases_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases",
            self.config.api_base.trim_end_matches('/'),
            self.config.owner,
            self.config.repo
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .basic_auth(&self.config.user, Some(&self.config.password))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }
}

/// Asset upload URL for `file_name`, from the `upload_url` template of a release
pub(crate) fn asset_upload_url(upload_url: &str, file_name: &str) -> Result<Url> {
    let base = upload_url
        .split_once('{')
        .map_or(upload_url, |(base, _)| base);
    let mut url = Url::parse(base).map_err(GitHubError::InvalidUrl)?;
    url.query_pairs_mut().append_pair("name", file_name);
    Ok(url)
}

/// Turn any status outside `accepted` into [`GitHubError::UnexpectedStatus`]
async fn expect_status(
    response: Response,
    operation: &'static str,
    accepted: impl Fn(StatusCode) -> bool,
) -> Result<Response> {
    let status = response.status();
    if accepted(status) {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GitHubError::UnexpectedStatus {
        operation,
        status: status.as_u16(),
        body: body.chars().take(512).collect(),
    }
    .into())
}

impl ReleaseHost for GitHubReleaseManager {
    async fn create_release(&self, tag: &str, name: &str) -> Result<ReleaseRecord> {
        const OPERATION: &str = "create release";

        let request = CreateReleaseRequest {
            tag_name: tag,
            name,
            body: RELEASE_BODY,
        };
        let response = self
            .authorized(self.client.post(self.releases_url()))
            .json(&request)
            .send()
            .await
            .map_err(GitHubError::Transport)?;
        let response = expect_status(response, OPERATION, |status| {
            status == StatusCode::CREATED
        })
        .await?;

        let text = response.text().await.map_err(GitHubError::Transport)?;
        let created: CreatedRelease =
            serde_json::from_str(&text).map_err(|e| GitHubError::InvalidResponse {
                operation: OPERATION,
                reason: e.to_string(),
            })?;

        let upload_url = created
            .upload_url
            .split_once('{')
            .map_or(created.upload_url.as_str(), |(base, _)| base)
            .to_string();

        log::info!("Created release {} ({tag}) on {}", created.id, self.slug());
        Ok(ReleaseRecord {
            id: created.id,
            upload_url,
        })
    }

    async fn upload_asset(
        &self,
        release: &ReleaseRecord,
        file_name: &str,
        content: Bytes,
    ) -> Result<()> {
        let url = asset_upload_url(&release.upload_url, file_name)?;
        let size = content.len();

        let response = self
            .authorized(self.client.post(url))
            .header(reqwest::header::CONTENT_TYPE, XPI_CONTENT_TYPE)
            .body(content)
            .send()
            .await
            .map_err(GitHubError::Transport)?;
        expect_status(response, "upload asset", |status| {
            status == StatusCode::CREATED || status == StatusCode::ACCEPTED
        })
        .await?;

        log::info!("Uploaded {file_name} ({size} bytes) to release {}", release.id);
        Ok(())
    }

    async fn delete_release(&self, release: &ReleaseRecord) -> Result<()> {
        let url = format!("{}/{}", self.releases_url(), release.id);
        let response = self
            .authorized(self.client.delete(url))
            .send()
            .await
            .map_err(GitHubError::Transport)?;
        expect_status(response, "delete release", |status| status.is_success()).await?;

        log::info!("Deleted release {} on {}", release.id, self.slug());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_url_template_stripped() {
        let url = asset_upload_url(
            "https://uploads.github.com/repos/me/ext/releases/7/assets{?name,label}",
            "ext-nightly-2024-01-02-0304.xpi",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://uploads.github.com/repos/me/ext/releases/7/assets?name=ext-nightly-2024-01-02-0304.xpi"
        );
    }

    #[test]
    fn test_releases_url_ignores_trailing_slash() {
        let manager = GitHubReleaseManager::new(GitHubReleaseConfig {
            owner: "me".to_string(),
            repo: "ext".to_string(),
            api_base: "http://127.0.0.1:9/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(manager.releases_url(), "http://127.0.0.1:9/repos/me/ext/releases");
        assert_eq!(manager.slug(), "me/ext");
    }
}
