use anyhow::Result;
use ccmup_core::{is_version_newer, AssetDescriptor, LinuxVariant};

use crate::store::VersionedStore;
use crate::InstallLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    pub installed: Option<String>,
    pub latest: String,
    /// `None` when either version cannot be compared.
    pub update_available: Option<bool>,
    pub asset_mismatch: bool,
    pub preferred_asset: String,
}

impl UpdateStatus {
    /// A newer release, or a different Linux runtime variant than the one installed.
    pub fn should_update(&self) -> bool {
        self.asset_mismatch || self.update_available == Some(true)
    }
}

/// Compares `latest` with the installed version (`installed_override` wins over `current`).
pub fn check_for_update(
    layout: &InstallLayout,
    latest: &str,
    installed_override: Option<&str>,
    preferred: &AssetDescriptor,
) -> Result<UpdateStatus> {
    let store = VersionedStore::new(layout);
    let current = store.current_version();
    let receipt = match &current {
        Some(name) => store.read_receipt(name)?,
        None => None,
    };

    let installed = installed_override
        .map(str::to_string)
        .or_else(|| receipt.as_ref().map(|receipt| receipt.tag.clone()))
        .or(current);
    let update_available = installed
        .as_deref()
        .and_then(|installed| is_version_newer(latest, installed));

    let installed_variant = receipt
        .as_ref()
        .and_then(|receipt| LinuxVariant::from_asset_name(&receipt.asset));
    let asset_mismatch = match (installed_variant, preferred.variant) {
        (Some(installed), Some(preferred)) => is_ncurses_switch(installed, preferred),
        _ => false,
    };

    Ok(UpdateStatus {
        installed,
        latest: latest.to_string(),
        update_available,
        asset_mismatch,
        preferred_asset: preferred.name.clone(),
    })
}

/// Only moves between the two ncurses builds are offered; the generic build is never
/// switched to or from.
fn is_ncurses_switch(installed: LinuxVariant, preferred: LinuxVariant) -> bool {
    let ncurses = |variant: LinuxVariant| matches!(variant, LinuxVariant::Nc5 | LinuxVariant::Nc6);
    ncurses(installed) && ncurses(preferred) && installed != preferred
}
