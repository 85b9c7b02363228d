use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use ccmup_core::InstallError;
use tracing::{debug, warn};

use crate::repo::RepoId;

pub const LATEST: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRequest {
    Latest,
    Pinned(String),
}

impl TagRequest {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case(LATEST) {
            Self::Latest
        } else {
            Self::Pinned(raw.to_string())
        }
    }
}

/// What to download and where to keep it.
///
/// `download_tag` is `None` when only the moving "latest" release could be addressed; the
/// version directory then carries a unique `latest-<unix-nanos>-<pid>` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRef {
    download_tag: Option<String>,
    version_dir: String,
}

impl ReleaseRef {
    pub fn tagged(tag: &str) -> Self {
        Self {
            download_tag: Some(tag.to_string()),
            version_dir: tag.to_string(),
        }
    }

    pub fn literal_latest(now_nanos: u128, pid: u32) -> Self {
        Self {
            download_tag: None,
            version_dir: format!("{LATEST}-{now_nanos}-{pid}"),
        }
    }

    pub fn download_tag(&self) -> Option<&str> {
        self.download_tag.as_deref()
    }

    pub fn version_dir(&self) -> &str {
        &self.version_dir
    }

    pub fn is_literal_latest(&self) -> bool {
        self.download_tag.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStrategy {
    ApiQuery,
    RedirectProbe,
    Literal,
}

impl TagStrategy {
    pub fn online() -> &'static [TagStrategy] {
        &[Self::ApiQuery, Self::RedirectProbe, Self::Literal]
    }

    pub fn offline() -> &'static [TagStrategy] {
        &[Self::Literal]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApiQuery => "api-query",
            Self::RedirectProbe => "redirect-probe",
            Self::Literal => "literal",
        }
    }
}

pub trait LatestTagLookup {
    fn api_latest_tag(&self, repo: &RepoId) -> Result<String>;
    fn redirect_latest_tag(&self, repo: &RepoId) -> Result<String>;
}

pub fn resolve_release_ref(
    request: &TagRequest,
    repo: &RepoId,
    strategies: &[TagStrategy],
    lookup: Option<&dyn LatestTagLookup>,
) -> ReleaseRef {
    if let TagRequest::Pinned(tag) = request {
        return ReleaseRef::tagged(tag);
    }

    for strategy in strategies {
        match run_strategy(*strategy, repo, lookup) {
            Ok(Some(tag)) => {
                debug!(strategy = strategy.as_str(), %tag, "resolved latest release tag");
                return ReleaseRef::tagged(&tag);
            }
            Ok(None) => break,
            Err(err) => {
                warn!(strategy = strategy.as_str(), "latest tag lookup failed: {err:#}");
            }
        }
    }

    let fallback = ReleaseRef::literal_latest(unix_nanos(), std::process::id());
    debug!(
        version_dir = fallback.version_dir(),
        "installing the moving latest release under a unique directory"
    );
    fallback
}

/// Concrete latest tag for update checks; the literal fallback does not apply here.
pub fn resolve_latest_tag(repo: &RepoId, lookup: &dyn LatestTagLookup) -> Result<String> {
    let mut failures = Vec::new();
    for strategy in [TagStrategy::ApiQuery, TagStrategy::RedirectProbe] {
        match run_strategy(strategy, repo, Some(lookup)) {
            Ok(Some(tag)) => return Ok(tag),
            Ok(None) => {}
            Err(err) => failures.push(format!("{}: {err:#}", strategy.as_str())),
        }
    }
    Err(InstallError::FetchFailed {
        what: "latest release tag".to_string(),
        location: repo.latest_release_page_url(),
        reason: failures.join("; "),
    }
    .into())
}

// `Ok(None)` ends the chain and selects the literal fallback.
fn run_strategy(
    strategy: TagStrategy,
    repo: &RepoId,
    lookup: Option<&dyn LatestTagLookup>,
) -> Result<Option<String>> {
    let tag = match (strategy, lookup) {
        (TagStrategy::Literal, _) => return Ok(None),
        (_, None) => return Err(anyhow!("network lookups are disabled in offline mode")),
        (TagStrategy::ApiQuery, Some(lookup)) => lookup.api_latest_tag(repo)?,
        (TagStrategy::RedirectProbe, Some(lookup)) => lookup.redirect_latest_tag(repo)?,
    };
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(anyhow!("lookup returned an empty tag"));
    }
    Ok(Some(tag.to_string()))
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or(0)
}
