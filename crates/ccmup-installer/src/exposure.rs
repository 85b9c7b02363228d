use anyhow::{anyhow, Context, Result};
use ccmup_core::{ALIAS_NAME, PRIMARY_NAME};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::fs_utils::remove_any;
use crate::store::create_symlink;
use crate::InstallLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFailure {
    pub link: PathBuf,
    pub reason: String,
}

/// Outcome of the best-effort command link step; failures never abort an install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub created: Vec<PathBuf>,
    pub failures: Vec<LinkFailure>,
}

impl LinkReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// (Re)creates `<bin>/ccm -> <root>/current/ccm/ccm` and `<bin>/cursor-cli-manager -> ccm`.
pub fn link_commands(layout: &InstallLayout) -> LinkReport {
    let mut report = LinkReport::default();
    let primary = layout.command_link_path(PRIMARY_NAME);
    let alias = layout.command_link_path(ALIAS_NAME);

    if let Err(err) = check_bin_dir(layout) {
        for link in [primary, alias] {
            record_failure(&mut report, link, &err);
        }
        return report;
    }

    let links = [
        (primary, layout.current_entrypoint()),
        (alias, PathBuf::from(PRIMARY_NAME)),
    ];
    for (link, target) in links {
        match replace_link(&link, &target) {
            Ok(()) => {
                debug!(link = %link.display(), target = %target.display(), "command link updated");
                report.created.push(link);
            }
            Err(err) => record_failure(&mut report, link, &err),
        }
    }
    report
}

fn record_failure(report: &mut LinkReport, link: PathBuf, err: &anyhow::Error) {
    warn!(link = %link.display(), "failed to update command link: {err:#}");
    report.failures.push(LinkFailure {
        link,
        reason: format!("{err:#}"),
    });
}

fn check_bin_dir(layout: &InstallLayout) -> Result<()> {
    let bin_dir = layout.bin_dir();
    for managed in [layout.current_path(), layout.versions_dir()] {
        if is_within(bin_dir, &managed) {
            return Err(anyhow!(
                "refusing to create command links inside the managed store: {}",
                bin_dir.display()
            ));
        }
    }
    fs::create_dir_all(bin_dir)
        .with_context(|| format!("failed to create {}", bin_dir.display()))
}

fn replace_link(link: &Path, target: &Path) -> Result<()> {
    let resolved_target = match link.parent() {
        Some(parent) if target.is_relative() => parent.join(target),
        _ => target.to_path_buf(),
    };
    if resolved_target == link {
        return Err(anyhow!(
            "refusing self-referential link {} -> {}",
            link.display(),
            target.display()
        ));
    }

    let file_name = link
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("invalid command link path: {}", link.display()))?;
    let tmp = link.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));
    remove_any(&tmp).with_context(|| format!("failed to clear {}", tmp.display()))?;
    create_symlink(target, &tmp)?;
    if let Err(err) = fs::rename(&tmp, link) {
        let _ = fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("failed to replace {}", link.display()));
    }
    Ok(())
}

// Lexical and canonical containment, so `current` symlink aliases are caught too.
fn is_within(path: &Path, base: &Path) -> bool {
    if path.starts_with(base) {
        return true;
    }
    match (fs::canonicalize(path), fs::canonicalize(base)) {
        (Ok(path), Ok(base)) => path.starts_with(base),
        _ => false,
    }
}
