use std::fmt;
use std::path::Path;

use anyhow::Result;
use ccmup_core::{ChecksumManifest, InstallError};
use tracing::{debug, warn};

use crate::checksum::sha256_file_hex;
use crate::ed25519::verify_manifest_signature_hex;

/// How to treat a release that cannot be verified.
///
/// `Permissive` keeps installs working when a release ships without a checksum
/// manifest (or without an entry for the asset). That is a deliberate trade of
/// integrity for availability: such an asset is installed unverified and only a
/// warning is emitted. `Strict` turns every skipped check into a hard failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerificationPolicy {
    #[default]
    Permissive,
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    pub policy: VerificationPolicy,
    pub manifest_public_key_hex: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ManifestMissing,
    AssetNotListed,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManifestMissing => "manifest_missing",
            Self::AssetNotListed => "asset_not_listed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManifestMissing => f.write_str("no checksum manifest was published"),
            Self::AssetNotListed => f.write_str("the checksum manifest has no entry for the asset"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified { digest: String },
    Skipped { reason: SkipReason, digest: String },
}

impl VerificationOutcome {
    pub fn digest(&self) -> &str {
        match self {
            Self::Verified { digest } | Self::Skipped { digest, .. } => digest,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    pub fn receipt_token(&self) -> String {
        match self {
            Self::Verified { .. } => "verified".to_string(),
            Self::Skipped { reason, .. } => format!("skipped:{}", reason.as_str()),
        }
    }
}

/// Verifies a downloaded asset against the release's checksum manifest.
///
/// `manifest` and `signature` are the raw bytes of the optional manifest files.
pub fn verify_release_files(
    asset_path: &Path,
    asset_name: &str,
    manifest: Option<&[u8]>,
    signature: Option<&str>,
    options: &VerifyOptions,
) -> Result<VerificationOutcome> {
    let digest = sha256_file_hex(asset_path)?;

    let Some(manifest_bytes) = manifest else {
        return skipped(asset_name, SkipReason::ManifestMissing, digest, options.policy);
    };

    if let Some(public_key) = options.manifest_public_key_hex.as_deref() {
        check_manifest_signature(manifest_bytes, public_key, signature, asset_name, options.policy)?;
    }

    let parsed = ChecksumManifest::parse(&String::from_utf8_lossy(manifest_bytes));
    let Some(expected) = parsed.digest_for(asset_name) else {
        return skipped(asset_name, SkipReason::AssetNotListed, digest, options.policy);
    };

    if !expected.eq_ignore_ascii_case(&digest) {
        return Err(InstallError::ChecksumMismatch {
            asset: asset_name.to_string(),
            expected: expected.to_string(),
            actual: digest,
        }
        .into());
    }

    debug!(asset = asset_name, %digest, "asset checksum verified");
    Ok(VerificationOutcome::Verified { digest })
}

fn check_manifest_signature(
    manifest: &[u8],
    public_key_hex: &str,
    signature: Option<&str>,
    asset_name: &str,
    policy: VerificationPolicy,
) -> Result<()> {
    let Some(signature) = signature else {
        if policy == VerificationPolicy::Strict {
            return Err(InstallError::VerificationRequired {
                asset: asset_name.to_string(),
                reason: "a manifest public key is configured but no manifest signature was published"
                    .to_string(),
            }
            .into());
        }
        warn!("manifest public key configured but release has no manifest signature; trusting manifest unsigned");
        return Ok(());
    };

    match verify_manifest_signature_hex(manifest, public_key_hex, signature) {
        Ok(true) => {
            debug!("checksum manifest signature verified");
            Ok(())
        }
        Ok(false) => Err(InstallError::ManifestSignatureInvalid {
            reason: "signature does not match manifest contents".to_string(),
        }
        .into()),
        Err(err) => Err(InstallError::ManifestSignatureInvalid {
            reason: format!("{err:#}"),
        }
        .into()),
    }
}

fn skipped(
    asset_name: &str,
    reason: SkipReason,
    digest: String,
    policy: VerificationPolicy,
) -> Result<VerificationOutcome> {
    if policy == VerificationPolicy::Strict {
        return Err(InstallError::VerificationRequired {
            asset: asset_name.to_string(),
            reason: reason.to_string(),
        }
        .into());
    }
    warn!(asset = asset_name, %reason, "installing without checksum verification");
    Ok(VerificationOutcome::Skipped { reason, digest })
}
