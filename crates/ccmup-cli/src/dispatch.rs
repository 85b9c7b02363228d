use std::io;
use std::path::Path;

use anyhow::Result;
use ccmup_core::{resolve_asset, AssetDescriptor, HostLibraryProbe, PlatformRequest, PRIMARY_NAME};
use ccmup_installer::{
    check_for_update, check_runnable, inspect_lock, run_install, unlock, InstallLayout,
    InstallRequest, Runnability, UnlockOutcome, VersionedStore,
};
use ccmup_release::{ReleaseFetcher, RepoId, TagRequest};
use tracing::{debug, info};

use crate::cli::{Cli, Commands, LocationArgs, SourceArgs};
use crate::completion::write_completions_script;
use crate::config::{
    config_file_path, infer_upgrade_locations, load_file_config, resolve_settings, ProcessEnv,
    Settings,
};
use crate::render::{
    format_install_outcome_lines, format_lock_state, format_update_status_lines, TerminalRenderer,
};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone();
    let load = |location: &LocationArgs, source: &SourceArgs| -> Result<Settings> {
        let env = ProcessEnv;
        let path = config_file_path(config_path.as_deref(), &env);
        debug!(config = ?path, "loading configuration");
        let file = load_file_config(path.as_deref(), config_path.is_some())?;
        resolve_settings(file, &env, location, source)
    };

    match cli.command {
        Commands::Install { location, source } => {
            let settings = load(&location, &source)?;
            run_install_command("installed", &settings)
        }
        Commands::Upgrade { location, source } => {
            let mut settings = load(&location, &source)?;
            let ccm_on_path = which::which(PRIMARY_NAME).ok();
            let running_exe = std::env::current_exe().ok();
            infer_upgrade_locations(
                &mut settings,
                ccm_on_path.as_deref(),
                running_exe.as_deref(),
            );
            run_install_command("upgraded", &settings)
        }
        Commands::Check {
            location,
            source,
            current_version,
        } => {
            let settings = load(&location, &source)?;
            run_check_command(&settings, current_version.as_deref())
        }
        Commands::Doctor { location } => {
            let settings = load(&location, &SourceArgs::default())?;
            run_doctor_command(&settings)
        }
        Commands::Unlock { location, force } => {
            let settings = load(&location, &SourceArgs::default())?;
            run_unlock_command(&settings, force)
        }
        Commands::Completions { shell } => write_completions_script(shell, &mut io::stdout()),
    }
}

fn layout_for(settings: &Settings) -> InstallLayout {
    InstallLayout::new(&settings.root, &settings.dest)
}

fn resolve_preferred_asset(settings: &Settings) -> Result<AssetDescriptor> {
    let request = PlatformRequest {
        os: settings.os.as_deref(),
        arch: settings.arch.as_deref(),
        variant: settings.variant.as_deref(),
    };
    Ok(resolve_asset(&request, &HostLibraryProbe)?)
}

fn build_fetcher(settings: &Settings) -> Result<ReleaseFetcher> {
    let repo = RepoId::parse(&settings.repo)?;
    Ok(match &settings.from_dir {
        Some(dir) => ReleaseFetcher::offline(repo, dir),
        None => ReleaseFetcher::github(repo, settings.timeout)?,
    })
}

fn run_install_command(verb: &str, settings: &Settings) -> Result<()> {
    // Platform resolution must fail before anything touches the network.
    let asset = resolve_preferred_asset(settings)?;
    let fetcher = build_fetcher(settings)?;
    let layout = layout_for(settings);
    info!(
        root = %layout.root().display(),
        dest = %layout.bin_dir().display(),
        asset = %asset.name,
        source = %fetcher.describe_source(),
        "starting install"
    );

    let request = InstallRequest {
        tag: TagRequest::parse(&settings.tag),
        asset,
        verify: settings.verify_options(),
    };
    let renderer = TerminalRenderer::current();
    let mut progress = renderer.start_progress(&format!("installing {PRIMARY_NAME}"));
    let result = run_install(&layout, &fetcher, &request, &mut |event| {
        progress.observe(event)
    });
    match result {
        Ok(outcome) => {
            progress.finish_success();
            renderer.print_lines(&format_install_outcome_lines(
                verb,
                &outcome,
                renderer.style(),
            ));
            if !path_contains(layout.bin_dir()) {
                renderer.print_status(
                    "warn",
                    &format!(
                        "{} is not on PATH; add it to run `{PRIMARY_NAME}`",
                        layout.bin_dir().display()
                    ),
                );
            }
            Ok(())
        }
        Err(err) => {
            progress.finish_abandon();
            Err(err)
        }
    }
}

fn run_check_command(settings: &Settings, current_version: Option<&str>) -> Result<()> {
    let preferred = resolve_preferred_asset(settings)?;
    let fetcher = build_fetcher(settings)?;
    let latest = fetcher.latest_tag()?;
    let layout = layout_for(settings);
    let status = check_for_update(&layout, &latest, current_version, &preferred)?;
    let renderer = TerminalRenderer::current();
    renderer.print_lines(&format_update_status_lines(&status, renderer.style()));
    Ok(())
}

fn run_doctor_command(settings: &Settings) -> Result<()> {
    let layout = layout_for(settings);
    let store = VersionedStore::new(&layout);
    let renderer = TerminalRenderer::current();

    let mut lines = vec![
        format!("root: {}", layout.root().display()),
        format!("bin: {}", layout.bin_dir().display()),
        format!(
            "current: {}",
            store.current_version().as_deref().unwrap_or("none")
        ),
    ];
    let versions = store.list_versions()?;
    lines.push(format!(
        "versions: {}",
        if versions.is_empty() {
            "none".to_string()
        } else {
            versions.join(", ")
        }
    ));
    lines.push(format!("lock: {}", format_lock_state(&inspect_lock(&layout))));
    lines.push(match check_runnable(&layout) {
        Runnability::Runnable { entrypoint } => {
            format!("runnable: yes ({})", entrypoint.display())
        }
        Runnability::NotRunnable { reason } => format!("runnable: no ({reason})"),
    });
    match resolve_preferred_asset(settings) {
        Ok(asset) => lines.push(format!("preferred asset: {}", asset.name)),
        Err(err) => lines.push(format!("preferred asset: unavailable ({err:#})")),
    }
    for tool in ["curl", "wget", "tar"] {
        let found = which::which(tool)
            .map(|path| path.display().to_string())
            .unwrap_or_else(|_| "not found".to_string());
        lines.push(format!("{tool}: {found}"));
    }
    lines.push(format!(
        "bin on PATH: {}",
        if path_contains(layout.bin_dir()) { "yes" } else { "no" }
    ));
    renderer.print_lines(&lines);
    Ok(())
}

fn run_unlock_command(settings: &Settings, force: bool) -> Result<()> {
    let layout = layout_for(settings);
    let renderer = TerminalRenderer::current();
    match unlock(&layout, force)? {
        UnlockOutcome::NotLocked => renderer.print_status("ok", "no install lock present"),
        UnlockOutcome::Removed { owner } => {
            let message = match owner {
                Some(owner) => format!("removed install lock held by {owner}"),
                None => "removed install lock".to_string(),
            };
            renderer.print_status("ok", &message);
        }
        UnlockOutcome::OwnerAlive { owner } => {
            renderer.print_status(
                "warn",
                &format!("install lock is held by a running installer ({owner}); leaving it in place"),
            );
        }
        UnlockOutcome::OwnerUnknown => {
            renderer.print_status(
                "warn",
                &format!(
                    "cannot tell whether the lock owner is still running; rerun with --force to remove {}",
                    layout.lock_path().display()
                ),
            );
        }
    }
    Ok(())
}

fn path_contains(dir: &Path) -> bool {
    std::env::var_os("PATH").is_some_and(|path| {
        std::env::split_paths(&path).any(|entry| entry == dir || same_dir(&entry, dir))
    })
}

fn same_dir(left: &Path, right: &Path) -> bool {
    match (left.canonicalize(), right.canonicalize()) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

