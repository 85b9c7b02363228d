use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ccmup_core::{InstallError, DEFAULT_REPO, ENTRYPOINT_DIR};
use ccmup_installer::{default_bin_dir, default_install_root};
use ccmup_release::LATEST;
use ccmup_security::{VerificationPolicy, VerifyOptions};
use serde::Deserialize;

use crate::cli::{LocationArgs, SourceArgs};

pub(crate) const CONFIG_ENV: &str = "CCM_INSTALL_CONFIG";
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_REPO: &str = "CCM_GITHUB_REPO";
const ENV_TAG: &str = "CCM_INSTALL_TAG";
const ENV_DEST: &str = "CCM_INSTALL_DEST";
const ENV_ROOT: &str = "CCM_INSTALL_ROOT";
const ENV_FROM_DIR: &str = "CCM_INSTALL_FROM_DIR";
const ENV_OS: &str = "CCM_INSTALL_OS";
const ENV_ARCH: &str = "CCM_INSTALL_ARCH";
const ENV_VARIANT: [&str; 2] = ["CCM_INSTALL_NCURSES_VARIANT", "CCM_NCURSES_VARIANT"];
const ENV_STRICT: &str = "CCM_INSTALL_STRICT";
const ENV_TIMEOUT: &str = "CCM_INSTALL_TIMEOUT_SECS";
const ENV_PUBKEY: &str = "CCM_INSTALL_MANIFEST_PUBKEY";

/// Read access to environment variables; blank values read as unset.
pub(crate) trait EnvSource {
    fn raw(&self, key: &str) -> Option<String>;

    fn get(&self, key: &str) -> Option<String> {
        self.raw(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

pub(crate) struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn raw(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn raw(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) repo: Option<String>,
    pub(crate) tag: Option<String>,
    pub(crate) dest: Option<PathBuf>,
    pub(crate) root: Option<PathBuf>,
    pub(crate) from_dir: Option<PathBuf>,
    pub(crate) os: Option<String>,
    pub(crate) arch: Option<String>,
    pub(crate) ncurses_variant: Option<String>,
    pub(crate) strict: Option<bool>,
    pub(crate) timeout_secs: Option<u64>,
    pub(crate) manifest_public_key: Option<String>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub(crate) repo: String,
    pub(crate) tag: String,
    pub(crate) dest: PathBuf,
    pub(crate) root: PathBuf,
    pub(crate) dest_explicit: bool,
    pub(crate) root_explicit: bool,
    pub(crate) from_dir: Option<PathBuf>,
    pub(crate) os: Option<String>,
    pub(crate) arch: Option<String>,
    pub(crate) variant: Option<String>,
    pub(crate) strict: bool,
    pub(crate) timeout: Duration,
    pub(crate) manifest_public_key: Option<String>,
}

impl Settings {
    pub(crate) fn verify_options(&self) -> VerifyOptions {
        VerifyOptions {
            policy: if self.strict {
                VerificationPolicy::Strict
            } else {
                VerificationPolicy::Permissive
            },
            manifest_public_key_hex: self.manifest_public_key.clone(),
        }
    }
}

/// `--config`, then `$CCM_INSTALL_CONFIG`, then the XDG location.
pub(crate) fn config_file_path(explicit: Option<&Path>, env: &dyn EnvSource) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env.get(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    if let Some(xdg) = env.get("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("ccmup").join("config.toml"));
    }
    env.get("HOME")
        .map(|home| PathBuf::from(home).join(".config").join("ccmup").join("config.toml"))
}

/// Loads the TOML file; a missing file is only an error when it was named explicitly.
pub(crate) fn load_file_config(path: Option<&Path>, required: bool) -> Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => {
            return Ok(FileConfig::default());
        }
        Err(err) => {
            return Err(InstallError::Config(format!(
                "failed to read config file {}: {err}",
                path.display()
            )))
            .with_context(|| format!("failed loading configuration from {}", path.display()));
        }
    };
    parse_file_config(&raw)
        .with_context(|| format!("failed loading configuration from {}", path.display()))
}

pub(crate) fn parse_file_config(raw: &str) -> Result<FileConfig> {
    toml::from_str(raw).map_err(|err| InstallError::Config(err.to_string()).into())
}

pub(crate) fn resolve_settings(
    file: FileConfig,
    env: &dyn EnvSource,
    location: &LocationArgs,
    source: &SourceArgs,
) -> Result<Settings> {
    let repo = source
        .repo
        .clone()
        .or_else(|| env.get(ENV_REPO))
        .or(file.repo)
        .unwrap_or_else(|| DEFAULT_REPO.to_string());
    let tag = source
        .tag
        .clone()
        .or_else(|| env.get(ENV_TAG))
        .or(file.tag)
        .unwrap_or_else(|| LATEST.to_string());

    let dest = location
        .dest
        .clone()
        .or_else(|| env.get(ENV_DEST).map(PathBuf::from))
        .or(file.dest);
    let root = location
        .root
        .clone()
        .or_else(|| env.get(ENV_ROOT).map(PathBuf::from))
        .or(file.root);
    let home = env.get("HOME").map(PathBuf::from);
    let (dest_explicit, root_explicit) = (dest.is_some(), root.is_some());
    let dest = match dest {
        Some(dest) => dest,
        None => default_bin_dir(require_home(home.as_deref())?),
    };
    let root = match root {
        Some(root) => root,
        None => default_install_root(require_home(home.as_deref())?),
    };

    let from_dir = source
        .from_dir
        .clone()
        .or_else(|| env.get(ENV_FROM_DIR).map(PathBuf::from))
        .or(file.from_dir);
    let os = source.os.clone().or_else(|| env.get(ENV_OS)).or(file.os);
    let arch = source
        .arch
        .clone()
        .or_else(|| env.get(ENV_ARCH))
        .or(file.arch);
    let variant = source
        .variant
        .clone()
        .or_else(|| ENV_VARIANT.iter().find_map(|key| env.get(key)))
        .or(file.ncurses_variant);

    let strict = if source.strict {
        true
    } else {
        match env.get(ENV_STRICT) {
            Some(raw) => parse_bool(ENV_STRICT, &raw)?,
            None => file.strict.unwrap_or(false),
        }
    };

    let timeout_secs = match source.timeout_secs {
        Some(secs) => secs,
        None => match env.get(ENV_TIMEOUT) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                InstallError::Config(format!("{ENV_TIMEOUT} must be a whole number of seconds, got '{raw}'"))
            })?,
            None => file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        },
    };
    if timeout_secs == 0 {
        return Err(InstallError::Config("timeout must be at least one second".to_string()).into());
    }

    let manifest_public_key = env.get(ENV_PUBKEY).or(file.manifest_public_key);

    Ok(Settings {
        repo,
        tag,
        dest,
        root,
        dest_explicit,
        root_explicit,
        from_dir,
        os,
        arch,
        variant,
        strict,
        timeout: Duration::from_secs(timeout_secs),
        manifest_public_key,
    })
}

fn require_home(home: Option<&Path>) -> Result<&Path> {
    home.ok_or_else(|| {
        InstallError::Config("HOME is not set; pass --root and --dest explicitly".to_string())
            .into()
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(InstallError::Config(format!("{key} must be a boolean, got '{raw}'")).into()),
    }
}

/// Fills in destination and root for an in-place upgrade when nothing set them explicitly.
pub(crate) fn infer_upgrade_locations(
    settings: &mut Settings,
    ccm_on_path: Option<&Path>,
    running_exe: Option<&Path>,
) {
    if !settings.dest_explicit {
        if let Some(parent) = ccm_on_path.and_then(Path::parent) {
            settings.dest = parent.to_path_buf();
        }
    }
    if !settings.root_explicit {
        if let Some(root) = running_exe.and_then(infer_root_from_exe) {
            settings.root = root;
        }
    }
}

/// Recognizes `<root>/current/ccm/<exe>` and `<root>/versions/<tag>/ccm/<exe>`.
pub(crate) fn infer_root_from_exe(exe: &Path) -> Option<PathBuf> {
    let bundle_dir = exe.parent()?;
    if bundle_dir.file_name()? != ENTRYPOINT_DIR {
        return None;
    }
    let version_dir = bundle_dir.parent()?;
    let above = version_dir.parent()?;
    if version_dir.file_name()? == "current" {
        return Some(above.to_path_buf());
    }
    if above.file_name()? == "versions" {
        return above.parent().map(Path::to_path_buf);
    }
    None
}
