use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ccmup_core::{InstallError, CHECKSUMS_FILE_NAME, CHECKSUMS_SIGNATURE_FILE_NAME};
use tracing::info;

use crate::http::GithubLookup;
use crate::repo::RepoId;
use crate::source::{GithubSource, OfflineSource, ReleaseSource};
use crate::tag::{
    resolve_latest_tag, resolve_release_ref, LatestTagLookup, ReleaseRef, TagRequest, TagStrategy,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRelease {
    pub asset_path: PathBuf,
    pub manifest: Option<Vec<u8>>,
    pub signature: Option<String>,
}

pub struct ReleaseFetcher {
    repo: RepoId,
    source: Box<dyn ReleaseSource>,
    lookup: Option<Box<dyn LatestTagLookup>>,
    strategies: &'static [TagStrategy],
}

impl ReleaseFetcher {
    pub fn new(
        repo: RepoId,
        source: Box<dyn ReleaseSource>,
        lookup: Option<Box<dyn LatestTagLookup>>,
        strategies: &'static [TagStrategy],
    ) -> Self {
        Self {
            repo,
            source,
            lookup,
            strategies,
        }
    }

    pub fn github(repo: RepoId, timeout: Duration) -> Result<Self> {
        let lookup = GithubLookup::new(timeout)?;
        let source = GithubSource::new(repo.clone(), timeout);
        Ok(Self::new(
            repo,
            Box::new(source),
            Some(Box::new(lookup)),
            TagStrategy::online(),
        ))
    }

    pub fn offline(repo: RepoId, dir: impl Into<PathBuf>) -> Self {
        Self::new(
            repo,
            Box::new(OfflineSource::new(dir)),
            None,
            TagStrategy::offline(),
        )
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    pub fn describe_source(&self) -> String {
        self.source.describe()
    }

    pub fn resolve(&self, request: &TagRequest) -> ReleaseRef {
        resolve_release_ref(request, &self.repo, self.strategies, self.lookup.as_deref())
    }

    pub fn latest_tag(&self) -> Result<String> {
        let lookup = self.lookup.as_deref().ok_or_else(|| {
            InstallError::Config("the latest release tag cannot be queried from an offline source".to_string())
        })?;
        resolve_latest_tag(&self.repo, lookup)
    }

    /// Retrieves the asset (required) plus the checksum manifest and its signature (optional)
    /// into `staging`.
    pub fn fetch(&self, release: &ReleaseRef, asset_name: &str, staging: &Path) -> Result<FetchedRelease> {
        fs::create_dir_all(staging)
            .with_context(|| format!("failed to create staging dir: {}", staging.display()))?;

        let asset_path = staging.join(asset_name);
        info!(asset = asset_name, source = %self.source.describe(), "fetching release asset");
        self.source.fetch(release, asset_name, &asset_path)?;

        let manifest = match self.source.fetch_optional(
            release,
            CHECKSUMS_FILE_NAME,
            &staging.join(CHECKSUMS_FILE_NAME),
        ) {
            Some(path) => Some(
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?,
            ),
            None => None,
        };

        let signature = match manifest {
            Some(_) => match self.source.fetch_optional(
                release,
                CHECKSUMS_SIGNATURE_FILE_NAME,
                &staging.join(CHECKSUMS_SIGNATURE_FILE_NAME),
            ) {
                Some(path) => Some(
                    fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?,
                ),
                None => None,
            },
            None => None,
        };

        Ok(FetchedRelease {
            asset_path,
            manifest,
            signature,
        })
    }
}
