use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ccmup_core::InstallError;
use tracing::debug;

use crate::download::download_file;
use crate::repo::RepoId;
use crate::tag::ReleaseRef;

/// Where release files come from.
pub trait ReleaseSource {
    fn describe(&self) -> String;

    /// Places `file_name` of `release` at `dest`; a missing file is an error.
    fn fetch(&self, release: &ReleaseRef, file_name: &str, dest: &Path) -> Result<()>;

    /// Like [`ReleaseSource::fetch`] but any failure is reported as an absent file.
    fn fetch_optional(&self, release: &ReleaseRef, file_name: &str, dest: &Path) -> Option<PathBuf> {
        match self.fetch(release, file_name, dest) {
            Ok(()) => Some(dest.to_path_buf()),
            Err(err) => {
                debug!(file = file_name, source = %self.describe(), "optional release file unavailable: {err:#}");
                None
            }
        }
    }
}

pub struct GithubSource {
    repo: RepoId,
    timeout: Duration,
}

impl GithubSource {
    pub fn new(repo: RepoId, timeout: Duration) -> Self {
        Self { repo, timeout }
    }
}

impl ReleaseSource for GithubSource {
    fn describe(&self) -> String {
        format!("github:{}", self.repo)
    }

    fn fetch(&self, release: &ReleaseRef, file_name: &str, dest: &Path) -> Result<()> {
        let url = self.repo.download_url(release.download_tag(), file_name);
        download_file(&url, dest, self.timeout)
    }
}

/// A local directory holding the release files, for air-gapped installs and tests.
pub struct OfflineSource {
    dir: PathBuf,
}

impl OfflineSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReleaseSource for OfflineSource {
    fn describe(&self) -> String {
        format!("dir:{}", self.dir.display())
    }

    fn fetch(&self, _release: &ReleaseRef, file_name: &str, dest: &Path) -> Result<()> {
        let src = self.dir.join(file_name);
        match fs::copy(&src, dest) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(InstallError::FetchFailed {
                what: file_name.to_string(),
                location: self.dir.display().to_string(),
                reason: "file not found".to_string(),
            }
            .into()),
            Err(err) => Err(err).with_context(|| {
                format!("failed to copy {} to {}", src.display(), dest.display())
            }),
        }
    }
}
