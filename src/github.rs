//! GitHub release API client.

use crate::config::Settings;
use crate::error::{KelpError, Result};
use crate::types::GitHubRelease;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Build the API URL for a release. `latest` maps to the newest published
/// (non-draft) release; anything else is an exact tag.
pub fn build_release_url(api_url: &str, owner: &str, repo: &str, tag: &str) -> String {
    if tag == "latest" {
        format!("{}/repos/{}/{}/releases/latest", api_url, owner, repo)
    } else {
        format!("{}/repos/{}/{}/releases/tags/{}", api_url, owner, repo, tag)
    }
}

pub fn project_url(owner: &str, repo: &str) -> String {
    format!("https://github.com/{}/{}", owner, repo)
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    settings: Settings,
}

impl GitHubClient {
    pub fn new(settings: Settings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    /// Applies the headers every request needs, including the bearer token
    /// when one is configured.
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header(USER_AGENT, concat!("kelp/", env!("CARGO_PKG_VERSION")));
        match &self.settings.token {
            Some(token) => {
                tracing::debug!("Using GitHub token in http request");
                request.header(AUTHORIZATION, format!("Bearer {}", token))
            }
            None => request,
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetches a release, retrying transient failures with exponential
    /// backoff.
    pub async fn release(&self, owner: &str, repo: &str, tag: &str) -> Result<GitHubRelease> {
        let url = build_release_url(&self.settings.api_url, owner, repo, tag);
        tracing::info!("Getting release {} for {}/{}...", tag, owner, repo);

        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.fetch_release(&url, owner, repo, tag).await {
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}. Retrying in {:?}",
                        attempt,
                        MAX_ATTEMPTS,
                        url,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn fetch_release(
        &self,
        url: &str,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> Result<GitHubRelease> {
        tracing::debug!("Fetching GitHub release info from: {}", url);

        let response = self
            .authorize(self.client.get(url))
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(KelpError::ReleaseNotFound {
                repo: format!("{}/{}", owner, repo),
                tag: tag.to_string(),
            });
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(KelpError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let release: GitHubRelease = response.json().await?;
        tracing::debug!(
            "Release {} has {} assets",
            release.tag_name,
            release.assets.len()
        );
        Ok(release)
    }

    /// Tag name of the most recent release.
    pub async fn latest_tag(&self, owner: &str, repo: &str) -> Result<String> {
        Ok(self.release(owner, repo, "latest").await?.tag_name)
    }
}
