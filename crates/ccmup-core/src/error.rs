use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy used for exit statuses and for the repair decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Environment,
    Transient,
    Integrity,
    Concurrency,
    Corruption,
    Configuration,
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("unsupported platform: os={os} arch={arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("no download tool available: neither 'curl' nor 'wget' was found on PATH; install one of them and retry")]
    MissingDownloadTool,

    #[error("failed to fetch {what} from {location}: {reason}")]
    FetchFailed {
        what: String,
        location: String,
        reason: String,
    },

    #[error("Checksum mismatch for {asset}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        asset: String,
        expected: String,
        actual: String,
    },

    #[error("checksum manifest signature is invalid: {reason}")]
    ManifestSignatureInvalid { reason: String },

    #[error("verification required but not possible for {asset}: {reason}")]
    VerificationRequired { asset: String, reason: String },

    #[error("required extraction tool '{tool}' was not found on PATH; install it and retry")]
    MissingExtractionTool { tool: String },

    #[error("invalid bundle: {reason}")]
    InvalidBundle { reason: String },

    #[error("failed to place version directory {}: {reason}", .path.display())]
    StorePlacement { path: PathBuf, reason: String },

    #[error(
        "another ccm install/upgrade is in progress (lock: {}{}); if no installer is running, remove the stale lock with `ccmup unlock` or `rm -rf {}`",
        .lock.display(),
        .owner.as_deref().map(|who| format!(", owner: {who}")).unwrap_or_default(),
        .lock.display()
    )]
    InstallInProgress { lock: PathBuf, owner: Option<String> },

    #[error(
        "ccm is still not runnable after an automatic repair: {reason}; remove {} and rerun the installer, or check that the filesystem permits executables",
        .root.display()
    )]
    NotRunnable { reason: String, root: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl InstallError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnsupportedPlatform { .. }
            | Self::MissingDownloadTool
            | Self::MissingExtractionTool { .. } => ErrorClass::Environment,
            Self::FetchFailed { .. } => ErrorClass::Transient,
            Self::ChecksumMismatch { .. }
            | Self::ManifestSignatureInvalid { .. }
            | Self::VerificationRequired { .. } => ErrorClass::Integrity,
            Self::InstallInProgress { .. } => ErrorClass::Concurrency,
            Self::InvalidBundle { .. } | Self::StorePlacement { .. } | Self::NotRunnable { .. } => {
                ErrorClass::Corruption
            }
            Self::Config(_) => ErrorClass::Configuration,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FetchFailed { .. } => 1,
            Self::UnsupportedPlatform { .. } => 10,
            Self::MissingDownloadTool => 11,
            Self::ChecksumMismatch { .. } | Self::ManifestSignatureInvalid { .. } => 12,
            Self::MissingExtractionTool { .. } => 13,
            Self::InvalidBundle { .. } | Self::StorePlacement { .. } => 14,
            Self::InstallInProgress { .. } => 15,
            Self::NotRunnable { .. } => 16,
            Self::VerificationRequired { .. } => 17,
            Self::Config(_) => 18,
        }
    }

    /// Whether the one-shot reset-and-reinstall may be attempted for this failure.
    pub fn triggers_repair(&self) -> bool {
        self.class() == ErrorClass::Corruption && !matches!(self, Self::NotRunnable { .. })
    }
}

pub fn find_install_error(err: &anyhow::Error) -> Option<&InstallError> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<InstallError>())
}
