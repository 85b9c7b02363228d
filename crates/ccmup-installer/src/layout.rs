use anyhow::{Context, Result};
use ccmup_core::{entrypoint_rel_path, PRIMARY_NAME};
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const EXTRACT_TMP_PREFIX: &str = ".extract-";
pub(crate) const STAGING_TMP_PREFIX: &str = ".staging-";
pub(crate) const CURRENT_TMP_PREFIX: &str = ".current.";

/// Paths owned by one installation: the install root and the command directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    bin_dir: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>, bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            bin_dir: bin_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, tag: &str) -> PathBuf {
        self.versions_dir().join(tag)
    }

    pub fn current_path(&self) -> PathBuf {
        self.root.join("current")
    }

    pub fn current_entrypoint(&self) -> PathBuf {
        self.current_path().join(entrypoint_rel_path())
    }

    pub fn version_entrypoint(&self, tag: &str) -> PathBuf {
        self.version_dir(tag).join(entrypoint_rel_path())
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".lock")
    }

    pub fn lock_owner_path(&self) -> PathBuf {
        self.lock_path().join("owner")
    }

    pub fn current_tmp_path(&self) -> PathBuf {
        self.root
            .join(format!("{CURRENT_TMP_PREFIX}{}.tmp", std::process::id()))
    }

    pub fn extract_tmp_dir(&self, nanos: u128) -> PathBuf {
        self.versions_dir().join(format!(
            "{EXTRACT_TMP_PREFIX}{}-{nanos}",
            std::process::id()
        ))
    }

    pub fn staging_dir(&self, nanos: u128) -> PathBuf {
        self.root
            .join(format!("{STAGING_TMP_PREFIX}{}-{nanos}", std::process::id()))
    }

    pub fn command_link_path(&self, name: &str) -> PathBuf {
        self.bin_dir.join(name)
    }

    pub fn primary_link_path(&self) -> PathBuf {
        self.command_link_path(PRIMARY_NAME)
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.versions_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_install_root(home: &Path) -> PathBuf {
    home.join(".local").join("lib").join(PRIMARY_NAME)
}

pub fn default_bin_dir(home: &Path) -> PathBuf {
    home.join(".local").join("bin")
}
