use anyhow::{anyhow, Context, Result};
use ccmup_core::{entrypoint_rel_path, InstallError};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

use crate::fs_utils::{path_occupied, remove_any, unix_nanos, TempDirGuard};
use crate::layout::{CURRENT_TMP_PREFIX, EXTRACT_TMP_PREFIX, STAGING_TMP_PREFIX};
use crate::receipts::{read_version_receipt, write_version_receipt, VersionReceipt};
use crate::InstallLayout;

/// An extracted, validated bundle waiting in a temporary directory next to `versions/`.
#[derive(Debug)]
pub struct StagedVersion {
    dir: TempDirGuard,
    entrypoint: PathBuf,
}

impl StagedVersion {
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn entrypoint(&self) -> &Path {
        &self.entrypoint
    }
}

/// All mutation of `versions/` and `current` goes through here; callers hold the install lock.
#[derive(Debug, Clone, Copy)]
pub struct VersionedStore<'a> {
    layout: &'a InstallLayout,
}

impl<'a> VersionedStore<'a> {
    pub fn new(layout: &'a InstallLayout) -> Self {
        Self { layout }
    }

    /// Removes leftovers of interrupted runs: extraction dirs, download staging, pointer temps.
    pub fn cleanup_stale(&self) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        let candidates = [
            (self.layout.versions_dir(), EXTRACT_TMP_PREFIX, ""),
            (self.layout.root().to_path_buf(), STAGING_TMP_PREFIX, ""),
            (self.layout.root().to_path_buf(), CURRENT_TMP_PREFIX, ".tmp"),
        ];
        for (dir, prefix, suffix) in candidates {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(name) = name.to_str() else {
                    continue;
                };
                if !name.starts_with(prefix) || !name.ends_with(suffix) {
                    continue;
                }
                let path = entry.path();
                match remove_any(&path) {
                    Ok(()) => {
                        debug!(path = %path.display(), "removed stale temporary entry");
                        removed.push(path);
                    }
                    Err(err) => {
                        warn!(path = %path.display(), "failed to remove stale temporary entry: {err}")
                    }
                }
            }
        }
        removed
    }

    /// Extracts `archive` into a fresh temporary directory on the same filesystem as
    /// `versions/` and validates the entrypoint.
    pub fn extract_bundle(&self, archive: &Path) -> Result<StagedVersion> {
        fs::create_dir_all(self.layout.versions_dir()).with_context(|| {
            format!(
                "failed to create {}",
                self.layout.versions_dir().display()
            )
        })?;
        let dir = TempDirGuard::new(self.layout.extract_tmp_dir(unix_nanos()));
        fs::create_dir(dir.path())
            .with_context(|| format!("failed creating tmp dir: {}", dir.path().display()))?;

        check_archive_members(archive)?;
        extract_tar_gz(archive, dir.path())?;

        let entrypoint = dir.path().join(entrypoint_rel_path());
        make_executable(&entrypoint);
        validate_entrypoint(&entrypoint)?;

        Ok(StagedVersion { dir, entrypoint })
    }

    pub fn write_receipt(&self, staged: &StagedVersion, receipt: &VersionReceipt) -> Result<()> {
        write_version_receipt(staged.dir(), receipt).map(|_| ())
    }

    /// Renames the staged bundle to `versions/<tag>` and returns the directory name used.
    pub fn place_version(&self, staged: StagedVersion, tag: &str) -> Result<String> {
        let mut name = sanitize_tag(tag);
        let mut target = self.layout.version_dir(&name);
        if path_occupied(&target) {
            if let Err(err) = remove_any(&target) {
                let fallback = format!("{name}-{}", unix_nanos());
                warn!(
                    path = %target.display(),
                    fallback = %fallback,
                    "failed to remove existing version directory ({err}); installing under a new name"
                );
                name = fallback;
                target = self.layout.version_dir(&name);
            }
        }

        let source = staged.dir.path().to_path_buf();
        fs::rename(&source, &target).map_err(|err| InstallError::StorePlacement {
            path: target.clone(),
            reason: format!("rename from {} failed: {err}", source.display()),
        })?;
        staged.dir.keep();
        info!(version = %name, path = %target.display(), "version directory placed");
        Ok(name)
    }

    /// Points `current` at `versions/<name>` with a single rename.
    pub fn switch_current(&self, name: &str) -> Result<()> {
        let version_dir = self.layout.version_dir(name);
        if !version_dir.is_dir() {
            return Err(anyhow!(
                "cannot activate missing version directory: {}",
                version_dir.display()
            ));
        }

        let tmp = self.layout.current_tmp_path();
        remove_any(&tmp)
            .with_context(|| format!("failed to clear pointer temp: {}", tmp.display()))?;
        let relative_target = Path::new("versions").join(name);
        create_symlink(&relative_target, &tmp)?;

        let current = self.layout.current_path();
        if let Ok(metadata) = fs::symlink_metadata(&current) {
            // rename(2) cannot replace a non-empty real directory
            if metadata.is_dir() {
                if let Err(err) = fs::remove_dir_all(&current) {
                    let _ = fs::remove_file(&tmp);
                    return Err(InstallError::StorePlacement {
                        path: current,
                        reason: format!("failed to remove directory occupying the pointer: {err}"),
                    }
                    .into());
                }
            }
        }

        if let Err(err) = fs::rename(&tmp, &current) {
            let _ = fs::remove_file(&tmp);
            return Err(InstallError::StorePlacement {
                path: current,
                reason: format!("failed to switch pointer: {err}"),
            }
            .into());
        }
        info!(current = %relative_target.display(), "current pointer switched");
        Ok(())
    }

    /// Version directory name `current` points at, if it is a store pointer.
    pub fn current_version(&self) -> Option<String> {
        let target = fs::read_link(self.layout.current_path()).ok()?;
        let name = target.file_name()?.to_str()?.to_string();
        let parent = target.parent()?;
        let expected_parent = if target.is_absolute() {
            self.layout.versions_dir()
        } else {
            PathBuf::from("versions")
        };
        (parent == expected_parent).then_some(name)
    }

    pub fn list_versions(&self) -> Result<Vec<String>> {
        let dir = self.layout.versions_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", dir.display()))
            }
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to read {}", dir.display()))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') || !entry.file_type()?.is_dir() {
                continue;
            }
            versions.push(name);
        }
        versions.sort();
        Ok(versions)
    }

    pub fn read_receipt(&self, name: &str) -> Result<Option<VersionReceipt>> {
        read_version_receipt(&self.layout.version_dir(name))
    }

    /// Destructive reset: drops `current` and the whole version store.
    pub fn reset(&self) -> Result<()> {
        let current = self.layout.current_path();
        remove_any(&current)
            .with_context(|| format!("failed to remove {}", current.display()))?;
        let versions = self.layout.versions_dir();
        remove_any(&versions)
            .with_context(|| format!("failed to remove {}", versions.display()))?;
        fs::create_dir_all(&versions)
            .with_context(|| format!("failed to create {}", versions.display()))?;
        warn!(root = %self.layout.root().display(), "install store reset");
        Ok(())
    }
}

/// Maps a release tag to a safe single path component.
pub fn sanitize_tag(tag: &str) -> String {
    let mut name: String = tag
        .trim()
        .chars()
        .map(|ch| {
            if ch == '/' || ch == '\\' || ch.is_control() || ch.is_whitespace() {
                '-'
            } else {
                ch
            }
        })
        .collect();
    if name.starts_with('.') {
        name.insert(0, '_');
    }
    if name.is_empty() {
        name.push_str("unknown");
    }
    name
}

/// Reason the entrypoint at `path` cannot be launched, if any.
pub fn entrypoint_problem(path: &Path) -> Option<String> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Some(format!("entrypoint {} does not exist", path.display()))
        }
        Err(err) => return Some(format!("cannot inspect entrypoint {}: {err}", path.display())),
    };
    if metadata.file_type().is_symlink() {
        return Some(format!("entrypoint {} is a symlink", path.display()));
    }
    if !metadata.is_file() {
        return Some(format!("entrypoint {} is not a regular file", path.display()));
    }
    if !is_executable(&metadata) {
        return Some(format!("entrypoint {} is not executable", path.display()));
    }
    None
}

pub fn validate_entrypoint(path: &Path) -> Result<(), InstallError> {
    if let Some(parent) = path.parent() {
        if fs::symlink_metadata(parent).is_ok_and(|metadata| metadata.file_type().is_symlink()) {
            return Err(InstallError::InvalidBundle {
                reason: format!("entrypoint directory {} is a symlink", parent.display()),
            });
        }
    }
    match entrypoint_problem(path) {
        Some(reason) => Err(InstallError::InvalidBundle { reason }),
        None => Ok(()),
    }
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}

fn make_executable(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let Ok(metadata) = fs::symlink_metadata(path) else {
            return;
        };
        if !metadata.is_file() {
            return;
        }
        let mut permissions = metadata.permissions();
        permissions.set_mode(permissions.mode() | 0o111);
        if let Err(err) = fs::set_permissions(path, permissions) {
            warn!(path = %path.display(), "failed to mark entrypoint executable: {err}");
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

fn check_archive_members(archive: &Path) -> Result<()> {
    let output = tar_command()
        .arg("-tzf")
        .arg(archive)
        .output()
        .map_err(|err| tar_spawn_error(err, "failed to list bundle"))?;
    if !output.status.success() {
        return Err(InstallError::InvalidBundle {
            reason: format!(
                "cannot list {}: status={} stderr='{}'",
                archive.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
        .into());
    }

    for member in String::from_utf8_lossy(&output.stdout).lines() {
        let unsafe_member = Path::new(member).components().any(|component| {
            matches!(
                component,
                Component::RootDir | Component::Prefix(_) | Component::ParentDir
            )
        });
        if unsafe_member {
            return Err(InstallError::InvalidBundle {
                reason: format!("archive member escapes the version directory: {member}"),
            }
            .into());
        }
    }
    Ok(())
}

fn extract_tar_gz(archive: &Path, dst: &Path) -> Result<()> {
    let output = tar_command()
        .arg("-xzf")
        .arg(archive)
        .arg("-C")
        .arg(dst)
        .output()
        .map_err(|err| tar_spawn_error(err, "failed to extract bundle"))?;
    if output.status.success() {
        return Ok(());
    }
    Err(InstallError::InvalidBundle {
        reason: format!(
            "failed to extract {}: status={} stderr='{}'",
            archive.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ),
    }
    .into())
}

fn tar_command() -> Command {
    Command::new("tar")
}

fn tar_spawn_error(err: io::Error, context_message: &str) -> anyhow::Error {
    if err.kind() == io::ErrorKind::NotFound {
        return InstallError::MissingExtractionTool {
            tool: "tar".to_string(),
        }
        .into();
    }
    anyhow::Error::new(err).context(format!("{context_message}: tar failed to start"))
}

pub(crate) fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).with_context(|| {
            format!(
                "failed to create symlink {} -> {}",
                link.display(),
                target.display()
            )
        })
    }

    #[cfg(not(unix))]
    {
        Err(anyhow!(
            "symlinks are required to create {} -> {}",
            link.display(),
            target.display()
        ))
    }
}
