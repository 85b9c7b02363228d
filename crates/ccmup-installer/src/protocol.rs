use anyhow::Result;
use ccmup_core::{find_install_error, AssetDescriptor, InstallError};
use ccmup_release::{FetchedRelease, ReleaseFetcher, ReleaseRef, TagRequest};
use ccmup_security::{verify_release_files, VerificationOutcome, VerifyOptions};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::exposure::{link_commands, LinkReport};
use crate::fs_utils::{path_occupied, unix_nanos, unix_now, TempDirGuard};
use crate::lock::InstallLock;
use crate::receipts::VersionReceipt;
use crate::repair::{check_runnable, RepairBudget, Runnability};
use crate::store::VersionedStore;
use crate::InstallLayout;

#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub tag: TagRequest,
    pub asset: AssetDescriptor,
    pub verify: VerifyOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    StaleEntriesRemoved(usize),
    ReleaseResolved { version: String, download_tag: Option<String> },
    Fetching { asset: String },
    Verified(VerificationOutcome),
    Activated { version: String },
    Repairing { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub tag: String,
    pub version_dir: PathBuf,
    pub entrypoint: PathBuf,
    pub asset: String,
    pub verification: VerificationOutcome,
    pub links: LinkReport,
    pub repaired: bool,
}

struct Attempt {
    version: String,
    verification: VerificationOutcome,
    links: LinkReport,
}

/// A downloaded and verified bundle waiting in the staging directory.
struct VerifiedBundle {
    staging: TempDirGuard,
    fetched: FetchedRelease,
    verification: VerificationOutcome,
}

/// Runs the whole install under one lock: pre-flight check, fetch, verify, extract, place,
/// switch, link, and at most one reset-and-retry.
///
/// A reset only ever happens with a verified bundle in hand, so transient and integrity
/// failures leave the existing store untouched.
pub fn run_install(
    layout: &InstallLayout,
    fetcher: &ReleaseFetcher,
    request: &InstallRequest,
    observer: &mut dyn FnMut(&InstallEvent),
) -> Result<InstallOutcome> {
    let lock = InstallLock::acquire(layout)?;
    layout.ensure_base_dirs()?;
    let store = VersionedStore::new(layout);

    let stale = store.cleanup_stale();
    if !stale.is_empty() {
        observer(&InstallEvent::StaleEntriesRemoved(stale.len()));
    }

    let mut budget = RepairBudget::single();
    let mut pending_reset = None;
    if path_occupied(&layout.current_path()) {
        if let Runnability::NotRunnable { reason } = check_runnable(layout) {
            budget.try_spend();
            pending_reset = Some(reason);
        }
    }

    let release = fetcher.resolve(&request.tag);
    observer(&InstallEvent::ReleaseResolved {
        version: release.version_dir().to_string(),
        download_tag: release.download_tag().map(str::to_string),
    });

    let outcome = loop {
        let bundle = fetch_verified(layout, fetcher, &release, request, observer)?;
        if let Some(reason) = pending_reset.take() {
            reset_for_repair(&store, &reason, observer)?;
        }

        let failure = match apply_bundle(layout, &store, &release, request, bundle, observer) {
            Ok(attempt) => match check_runnable(layout) {
                Runnability::Runnable { entrypoint } => {
                    break InstallOutcome {
                        version_dir: layout.version_dir(&attempt.version),
                        tag: attempt.version,
                        entrypoint,
                        asset: request.asset.name.clone(),
                        verification: attempt.verification,
                        links: attempt.links,
                        repaired: budget.used() > 0,
                    };
                }
                Runnability::NotRunnable { reason } => {
                    if !budget.try_spend() {
                        return Err(InstallError::NotRunnable {
                            reason,
                            root: layout.root().to_path_buf(),
                        }
                        .into());
                    }
                    reason
                }
            },
            Err(err) => {
                let repairable = find_install_error(&err).is_some_and(InstallError::triggers_repair);
                if !repairable || !budget.try_spend() {
                    return Err(err);
                }
                format!("{err:#}")
            }
        };
        pending_reset = Some(failure);
    };

    lock.release()?;
    info!(version = %outcome.tag, repaired = outcome.repaired, "install complete");
    Ok(outcome)
}

fn reset_for_repair(
    store: &VersionedStore<'_>,
    reason: &str,
    observer: &mut dyn FnMut(&InstallEvent),
) -> Result<()> {
    warn!(%reason, "installation is not runnable; resetting the install store once");
    observer(&InstallEvent::Repairing {
        reason: reason.to_string(),
    });
    store.reset()
}

fn fetch_verified(
    layout: &InstallLayout,
    fetcher: &ReleaseFetcher,
    release: &ReleaseRef,
    request: &InstallRequest,
    observer: &mut dyn FnMut(&InstallEvent),
) -> Result<VerifiedBundle> {
    let asset_name = request.asset.name.as_str();
    let staging = TempDirGuard::new(layout.staging_dir(unix_nanos()));

    observer(&InstallEvent::Fetching {
        asset: asset_name.to_string(),
    });
    let fetched = fetcher.fetch(release, asset_name, staging.path())?;
    let verification = verify_release_files(
        &fetched.asset_path,
        asset_name,
        fetched.manifest.as_deref(),
        fetched.signature.as_deref(),
        &request.verify,
    )?;
    observer(&InstallEvent::Verified(verification.clone()));

    Ok(VerifiedBundle {
        staging,
        fetched,
        verification,
    })
}

fn apply_bundle(
    layout: &InstallLayout,
    store: &VersionedStore<'_>,
    release: &ReleaseRef,
    request: &InstallRequest,
    bundle: VerifiedBundle,
    observer: &mut dyn FnMut(&InstallEvent),
) -> Result<Attempt> {
    let VerifiedBundle {
        staging,
        fetched,
        verification,
    } = bundle;

    let staged = store.extract_bundle(&fetched.asset_path)?;
    store.write_receipt(
        &staged,
        &VersionReceipt {
            tag: release
                .download_tag()
                .unwrap_or(release.version_dir())
                .to_string(),
            asset: request.asset.name.clone(),
            sha256: verification.digest().to_string(),
            verification: verification.receipt_token(),
            installed_at_unix: unix_now(),
        },
    )?;
    drop(staging);

    let version = store.place_version(staged, release.version_dir())?;
    store.switch_current(&version)?;
    observer(&InstallEvent::Activated {
        version: version.clone(),
    });

    let links = link_commands(layout);
    Ok(Attempt {
        version,
        verification,
        links,
    })
}
