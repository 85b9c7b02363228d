use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const RECEIPT_FILE_NAME: &str = ".ccmup-receipt";

/// What was installed into one version directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReceipt {
    pub tag: String,
    pub asset: String,
    pub sha256: String,
    pub verification: String,
    pub installed_at_unix: u64,
}

pub fn receipt_path(version_dir: &Path) -> PathBuf {
    version_dir.join(RECEIPT_FILE_NAME)
}

pub fn write_version_receipt(version_dir: &Path, receipt: &VersionReceipt) -> Result<PathBuf> {
    for value in [&receipt.tag, &receipt.asset, &receipt.sha256, &receipt.verification] {
        if value.contains('\n') {
            return Err(anyhow!("receipt values must not contain newlines"));
        }
    }

    let mut payload = String::new();
    payload.push_str(&format!("tag={}\n", receipt.tag));
    payload.push_str(&format!("asset={}\n", receipt.asset));
    payload.push_str(&format!("sha256={}\n", receipt.sha256));
    payload.push_str(&format!("verification={}\n", receipt.verification));
    payload.push_str(&format!(
        "installed_at_unix={}\n",
        receipt.installed_at_unix
    ));

    let path = receipt_path(version_dir);
    fs::write(&path, payload.as_bytes())
        .with_context(|| format!("failed to write version receipt: {}", path.display()))?;
    Ok(path)
}

pub fn read_version_receipt(version_dir: &Path) -> Result<Option<VersionReceipt>> {
    let path = receipt_path(version_dir);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read version receipt: {}", path.display()))
        }
    };
    parse_receipt(&raw)
        .map(Some)
        .with_context(|| format!("failed to parse version receipt: {}", path.display()))
}

pub(crate) fn parse_receipt(raw: &str) -> Result<VersionReceipt> {
    let mut tag = None;
    let mut asset = None;
    let mut sha256 = None;
    let mut verification = None;
    let mut installed_at_unix = None;

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        match k {
            "tag" => tag = Some(v.to_string()),
            "asset" => asset = Some(v.to_string()),
            "sha256" => sha256 = Some(v.to_string()),
            "verification" => verification = Some(v.to_string()),
            "installed_at_unix" => {
                installed_at_unix = Some(v.parse().context("installed_at_unix must be u64")?)
            }
            _ => {}
        }
    }

    Ok(VersionReceipt {
        tag: tag.context("missing tag")?,
        asset: asset.context("missing asset")?,
        sha256: sha256.unwrap_or_default(),
        verification: verification.unwrap_or_else(|| "unknown".to_string()),
        installed_at_unix: installed_at_unix.context("missing installed_at_unix")?,
    })
}
