use std::fmt;
use std::str::FromStr;

use ccmup_core::InstallError;

const GITHUB_WEB: &str = "https://github.com";
const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    owner: String,
    name: String,
}

impl RepoId {
    pub fn parse(raw: &str) -> Result<Self, InstallError> {
        let invalid =
            || InstallError::Config(format!("invalid GitHub repo '{raw}' (expected 'owner/name')"));
        let (owner, name) = raw.trim().split_once('/').ok_or_else(invalid)?;
        let (owner, name) = (owner.trim(), name.trim());
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn api_latest_release_url(&self) -> String {
        format!("{GITHUB_API}/repos/{}/{}/releases/latest", self.owner, self.name)
    }

    pub fn latest_release_page_url(&self) -> String {
        format!("{GITHUB_WEB}/{}/{}/releases/latest", self.owner, self.name)
    }

    /// `None` addresses the moving "latest" release.
    pub fn download_url(&self, tag: Option<&str>, file_name: &str) -> String {
        match tag {
            Some(tag) => format!(
                "{GITHUB_WEB}/{}/{}/releases/download/{tag}/{file_name}",
                self.owner, self.name
            ),
            None => format!(
                "{GITHUB_WEB}/{}/{}/releases/latest/download/{file_name}",
                self.owner, self.name
            ),
        }
    }
}

impl FromStr for RepoId {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
