use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use serde::Deserialize;

use ccmup_core::CHECKSUMS_FILE_NAME;
use tracing::debug;

use crate::repo::RepoId;
use crate::tag::{LatestTagLookup, LATEST};

const CLIENT_USER_AGENT: &str = concat!("ccmup/", env!("CARGO_PKG_VERSION"));
const GITHUB_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: Option<String>,
}

/// Metadata lookups against GitHub; artifact downloads go through the external tools.
pub struct GithubLookup {
    api: Client,
    probe: Client,
}

impl GithubLookup {
    pub fn new(timeout: Duration) -> Result<Self> {
        let api = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        let probe = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .context("failed to build HTTP redirect-probe client")?;
        Ok(Self { api, probe })
    }
}

impl LatestTagLookup for GithubLookup {
    fn api_latest_tag(&self, repo: &RepoId) -> Result<String> {
        let url = repo.api_latest_release_url();
        let response = self
            .api
            .get(&url)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(ACCEPT, GITHUB_JSON)
            .send()
            .with_context(|| format!("request failed: {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{url} returned status {status}"));
        }
        let body = response
            .text()
            .with_context(|| format!("failed to read response body: {url}"))?;
        parse_latest_release_json(&body)
    }

    /// Follows one hop of the "latest" download URL, then of the release page.
    fn redirect_latest_tag(&self, repo: &RepoId) -> Result<String> {
        let download_url = repo.download_url(None, CHECKSUMS_FILE_NAME);
        match self.redirect_target_tag(&download_url) {
            Ok(tag) => Ok(tag),
            Err(err) => {
                debug!("latest download URL gave no tag: {err:#}");
                self.redirect_target_tag(&repo.latest_release_page_url())
            }
        }
    }
}

impl GithubLookup {
    fn redirect_target_tag(&self, url: &str) -> Result<String> {
        let response = self
            .probe
            .get(url)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .with_context(|| format!("request failed: {url}"))?;
        let status = response.status();
        if !status.is_redirection() {
            return Err(anyhow!("{url} did not redirect (status {status})"));
        }
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| anyhow!("{url} redirected without a usable Location header"))?;
        tag_from_location(location)
            .ok_or_else(|| anyhow!("redirect target has no release tag: {location}"))
    }
}

pub fn parse_latest_release_json(body: &str) -> Result<String> {
    let release: LatestRelease =
        serde_json::from_str(body).context("unexpected GitHub API response shape")?;
    release
        .tag_name
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .ok_or_else(|| anyhow!("missing tag_name in GitHub API response"))
}

/// Extracts `v1.2.3` from `.../releases/tag/v1.2.3` or `.../releases/download/v1.2.3/<file>`.
pub fn tag_from_location(location: &str) -> Option<String> {
    let path = location.split(['?', '#']).next().unwrap_or_default();
    let (_, rest) = path
        .rsplit_once("/releases/download/")
        .or_else(|| path.rsplit_once("/tag/"))?;
    let tag = rest.split('/').find(|segment| !segment.is_empty())?;
    (tag != LATEST).then(|| tag.to_string())
}
