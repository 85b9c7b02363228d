use super::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use ccmup_core::InstallError;
use ccmup_installer::{InstallEvent, UpdateStatus};
use ccmup_security::{SkipReason, VerificationOutcome, VerificationPolicy};
use clap::error::ErrorKind;

use crate::cli::{Commands, LocationArgs, SourceArgs};
use crate::completion::{write_completions_script, CliCompletionShell};
use crate::config::{
    config_file_path, infer_root_from_exe, infer_upgrade_locations, load_file_config,
    parse_file_config, resolve_settings, FileConfig, DEFAULT_TIMEOUT_SECS,
};
use crate::render::{
    describe_event, format_update_status_lines, render_status_line, resolve_output_style,
    OutputStyle,
};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let sequence = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "ccmup-cli-tests-{label}-{}-{nanos}-{sequence}",
        std::process::id()
    ));
    fs::create_dir_all(&path).expect("must create test dir");
    path
}

fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert("HOME".to_string(), "/home/tester".to_string());
    for (key, value) in pairs {
        map.insert((*key).to_string(), (*value).to_string());
    }
    map
}

fn resolve(
    file: FileConfig,
    pairs: &[(&str, &str)],
    location: LocationArgs,
    source: SourceArgs,
) -> anyhow::Result<crate::config::Settings> {
    resolve_settings(file, &env(pairs), &location, &source)
}

#[test]
fn cli_parses_install_flags() {
    let cli = Cli::try_parse_from([
        "ccmup",
        "install",
        "--repo",
        "acme/ccm",
        "--tag",
        "v1.2.3",
        "--dest",
        "/opt/bin",
        "--root",
        "/opt/ccm",
        "--from-dir",
        "/tmp/release",
        "--variant",
        "nc5",
        "--strict",
        "--timeout-secs",
        "5",
    ])
    .expect("must parse install flags");

    let Commands::Install { location, source } = cli.command else {
        panic!("expected install command");
    };
    assert_eq!(location.dest.as_deref(), Some(Path::new("/opt/bin")));
    assert_eq!(location.root.as_deref(), Some(Path::new("/opt/ccm")));
    assert_eq!(source.repo.as_deref(), Some("acme/ccm"));
    assert_eq!(source.tag.as_deref(), Some("v1.2.3"));
    assert_eq!(source.from_dir.as_deref(), Some(Path::new("/tmp/release")));
    assert_eq!(source.variant.as_deref(), Some("nc5"));
    assert!(source.strict);
    assert_eq!(source.timeout_secs, Some(5));
}

#[test]
fn cli_accepts_global_verbosity_after_subcommand() {
    let cli = Cli::try_parse_from(["ccmup", "upgrade", "-vv"]).expect("must parse verbosity");
    assert_eq!(cli.verbose, 2);
    assert!(matches!(cli.command, Commands::Upgrade { .. }));
}

#[test]
fn cli_parses_check_unlock_and_completions() {
    let cli = Cli::try_parse_from(["ccmup", "check", "--current-version", "0.5.0"])
        .expect("must parse check");
    assert!(matches!(
        cli.command,
        Commands::Check { current_version: Some(ref version), .. } if version == "0.5.0"
    ));

    let cli = Cli::try_parse_from(["ccmup", "unlock", "--force"]).expect("must parse unlock");
    assert!(matches!(cli.command, Commands::Unlock { force: true, .. }));

    let cli = Cli::try_parse_from(["ccmup", "completions", "zsh"]).expect("must parse shell");
    assert!(matches!(
        cli.command,
        Commands::Completions {
            shell: CliCompletionShell::Zsh
        }
    ));
}

#[test]
fn cli_rejects_unknown_shell_and_missing_subcommand() {
    let err = Cli::try_parse_from(["ccmup", "completions", "tcsh"])
        .expect_err("unknown shell must be rejected");
    assert_eq!(err.kind(), ErrorKind::InvalidValue);

    let err = Cli::try_parse_from(["ccmup"]).expect_err("subcommand must be required");
    assert_eq!(
        err.kind(),
        ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    );
}

#[test]
fn cli_rejects_strict_on_doctor() {
    let err = Cli::try_parse_from(["ccmup", "doctor", "--strict"])
        .expect_err("doctor must not take source flags");
    assert_eq!(err.kind(), ErrorKind::UnknownArgument);
}

#[test]
fn settings_default_to_home_layout() {
    let settings = resolve(
        FileConfig::default(),
        &[],
        LocationArgs::default(),
        SourceArgs::default(),
    )
    .expect("must resolve defaults");

    assert_eq!(settings.repo, ccmup_core::DEFAULT_REPO);
    assert_eq!(settings.tag, "latest");
    assert_eq!(settings.dest, PathBuf::from("/home/tester/.local/bin"));
    assert_eq!(settings.root, PathBuf::from("/home/tester/.local/lib/ccm"));
    assert!(!settings.dest_explicit);
    assert!(!settings.root_explicit);
    assert!(!settings.strict);
    assert_eq!(settings.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    assert_eq!(settings.verify_options().policy, VerificationPolicy::Permissive);
}

#[test]
fn settings_layer_file_then_env_then_flags() {
    let file = parse_file_config(
        r#"
repo = "file/repo"
tag = "v0.1.0"
root = "/file/root"
dest = "/file/bin"
timeout_secs = 9
"#,
    )
    .expect("must parse config file");

    let from_file = resolve(
        file.clone(),
        &[],
        LocationArgs::default(),
        SourceArgs::default(),
    )
    .expect("must resolve file layer");
    assert_eq!(from_file.repo, "file/repo");
    assert_eq!(from_file.root, PathBuf::from("/file/root"));
    assert!(from_file.root_explicit);
    assert_eq!(from_file.timeout, Duration::from_secs(9));

    let from_env = resolve(
        file.clone(),
        &[("CCM_GITHUB_REPO", "env/repo"), ("CCM_INSTALL_TAG", "v0.2.0")],
        LocationArgs::default(),
        SourceArgs::default(),
    )
    .expect("must resolve env layer");
    assert_eq!(from_env.repo, "env/repo");
    assert_eq!(from_env.tag, "v0.2.0");
    assert_eq!(from_env.dest, PathBuf::from("/file/bin"));

    let from_flags = resolve(
        file,
        &[("CCM_GITHUB_REPO", "env/repo")],
        LocationArgs {
            dest: Some(PathBuf::from("/flag/bin")),
            root: None,
        },
        SourceArgs {
            repo: Some("flag/repo".to_string()),
            ..SourceArgs::default()
        },
    )
    .expect("must resolve flag layer");
    assert_eq!(from_flags.repo, "flag/repo");
    assert_eq!(from_flags.dest, PathBuf::from("/flag/bin"));
    assert_eq!(from_flags.root, PathBuf::from("/file/root"));
}

#[test]
fn blank_env_values_count_as_unset() {
    let settings = resolve(
        FileConfig {
            tag: Some("v3.0.0".to_string()),
            ..FileConfig::default()
        },
        &[("CCM_INSTALL_TAG", "   "), ("CCM_INSTALL_ROOT", "")],
        LocationArgs::default(),
        SourceArgs::default(),
    )
    .expect("must resolve");
    assert_eq!(settings.tag, "v3.0.0");
    assert!(!settings.root_explicit);
}

#[test]
fn variant_env_prefers_installer_specific_name() {
    let settings = resolve(
        FileConfig::default(),
        &[
            ("CCM_INSTALL_NCURSES_VARIANT", "nc6"),
            ("CCM_NCURSES_VARIANT", "nc5"),
        ],
        LocationArgs::default(),
        SourceArgs::default(),
    )
    .expect("must resolve");
    assert_eq!(settings.variant.as_deref(), Some("nc6"));

    let settings = resolve(
        FileConfig::default(),
        &[("CCM_NCURSES_VARIANT", "nc5")],
        LocationArgs::default(),
        SourceArgs::default(),
    )
    .expect("must resolve");
    assert_eq!(settings.variant.as_deref(), Some("nc5"));
}

#[test]
fn strict_and_manifest_key_flow_into_verify_options() {
    let settings = resolve(
        FileConfig {
            strict: Some(false),
            manifest_public_key: Some("ab".repeat(32)),
            ..FileConfig::default()
        },
        &[("CCM_INSTALL_STRICT", "yes")],
        LocationArgs::default(),
        SourceArgs::default(),
    )
    .expect("must resolve");
    let options = settings.verify_options();
    assert_eq!(options.policy, VerificationPolicy::Strict);
    assert_eq!(options.manifest_public_key_hex, Some("ab".repeat(32)));
}

#[test]
fn invalid_values_are_configuration_errors() {
    let err = resolve(
        FileConfig::default(),
        &[("CCM_INSTALL_STRICT", "sometimes")],
        LocationArgs::default(),
        SourceArgs::default(),
    )
    .expect_err("bad boolean must fail");
    assert_eq!(exit_status_for(&err), 18);

    let err = resolve(
        FileConfig::default(),
        &[("CCM_INSTALL_TIMEOUT_SECS", "soon")],
        LocationArgs::default(),
        SourceArgs::default(),
    )
    .expect_err("bad timeout must fail");
    assert_eq!(exit_status_for(&err), 18);

    let err = resolve(
        FileConfig::default(),
        &[],
        LocationArgs::default(),
        SourceArgs {
            timeout_secs: Some(0),
            ..SourceArgs::default()
        },
    )
    .expect_err("zero timeout must fail");
    assert_eq!(exit_status_for(&err), 18);

    let err = parse_file_config("colour = \"blue\"\n").expect_err("unknown keys must fail");
    assert_eq!(exit_status_for(&err), 18);
}

#[test]
fn missing_home_without_explicit_paths_fails() {
    let err = resolve_settings(
        FileConfig::default(),
        &BTreeMap::new(),
        &LocationArgs::default(),
        &SourceArgs::default(),
    )
    .expect_err("HOME is required for defaults");
    assert_eq!(exit_status_for(&err), 18);
}

#[test]
fn config_file_path_follows_precedence() {
    let explicit = Path::new("/etc/ccmup.toml");
    assert_eq!(
        config_file_path(Some(explicit), &env(&[("CCM_INSTALL_CONFIG", "/env.toml")])),
        Some(explicit.to_path_buf())
    );
    assert_eq!(
        config_file_path(None, &env(&[("CCM_INSTALL_CONFIG", "/env.toml")])),
        Some(PathBuf::from("/env.toml"))
    );
    assert_eq!(
        config_file_path(None, &env(&[("XDG_CONFIG_HOME", "/xdg")])),
        Some(PathBuf::from("/xdg/ccmup/config.toml"))
    );
    assert_eq!(
        config_file_path(None, &env(&[])),
        Some(PathBuf::from("/home/tester/.config/ccmup/config.toml"))
    );
}

#[test]
fn load_file_config_tolerates_missing_default_file_only() {
    let dir = test_dir("config");
    let missing = dir.join("absent.toml");
    assert_eq!(
        load_file_config(Some(&missing), false).expect("missing default file is fine"),
        FileConfig::default()
    );
    let err = load_file_config(Some(&missing), true).expect_err("explicit file must exist");
    assert_eq!(exit_status_for(&err), 18);

    let present = dir.join("config.toml");
    fs::write(&present, "strict = true\nncurses_variant = \"common\"\n")
        .expect("must write config file");
    let loaded = load_file_config(Some(&present), true).expect("must load config file");
    assert_eq!(loaded.strict, Some(true));
    assert_eq!(loaded.ncurses_variant.as_deref(), Some("common"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn root_is_inferred_from_store_paths_only() {
    assert_eq!(
        infer_root_from_exe(Path::new("/opt/ccm/current/ccm/ccm")),
        Some(PathBuf::from("/opt/ccm"))
    );
    assert_eq!(
        infer_root_from_exe(Path::new("/opt/ccm/versions/v1.0.0/ccm/ccm")),
        Some(PathBuf::from("/opt/ccm"))
    );
    assert_eq!(infer_root_from_exe(Path::new("/usr/local/bin/ccm")), None);
    assert_eq!(infer_root_from_exe(Path::new("/opt/other/v1/ccm/ccm")), None);
}

#[test]
fn upgrade_inference_keeps_explicit_locations() {
    let mut inferred = resolve(
        FileConfig::default(),
        &[],
        LocationArgs::default(),
        SourceArgs::default(),
    )
    .expect("must resolve");
    infer_upgrade_locations(
        &mut inferred,
        Some(Path::new("/usr/local/bin/ccm")),
        Some(Path::new("/srv/ccm/versions/v2.0.0/ccm/ccm")),
    );
    assert_eq!(inferred.dest, PathBuf::from("/usr/local/bin"));
    assert_eq!(inferred.root, PathBuf::from("/srv/ccm"));

    let mut explicit = resolve(
        FileConfig::default(),
        &[("CCM_INSTALL_ROOT", "/pinned/root"), ("CCM_INSTALL_DEST", "/pinned/bin")],
        LocationArgs::default(),
        SourceArgs::default(),
    )
    .expect("must resolve");
    infer_upgrade_locations(
        &mut explicit,
        Some(Path::new("/usr/local/bin/ccm")),
        Some(Path::new("/srv/ccm/current/ccm/ccm")),
    );
    assert_eq!(explicit.dest, PathBuf::from("/pinned/bin"));
    assert_eq!(explicit.root, PathBuf::from("/pinned/root"));
}

#[test]
fn exit_status_maps_categorized_errors_through_context() {
    let generic = anyhow::anyhow!("network hiccup");
    assert_eq!(exit_status_for(&generic), 1);

    let wrapped = Err::<(), _>(InstallError::InstallInProgress {
        lock: PathBuf::from("/tmp/root/.lock"),
        owner: None,
    })
    .context("failed to start install")
    .expect_err("must be an error");
    assert_eq!(exit_status_for(&wrapped), 15);

    let unsupported = anyhow::Error::from(InstallError::UnsupportedPlatform {
        os: "linux".to_string(),
        arch: "arm64".to_string(),
    });
    assert_eq!(exit_status_for(&unsupported), 10);
}

#[test]
fn log_directive_tracks_verbosity() {
    assert_eq!(default_log_directive(0), "warn");
    assert_eq!(default_log_directive(1), "info");
    assert_eq!(default_log_directive(3), "debug");
}

#[test]
fn output_style_follows_stdout_tty() {
    assert_eq!(resolve_output_style(true, true), OutputStyle::Rich);
    assert_eq!(resolve_output_style(true, false), OutputStyle::Rich);
    assert_eq!(resolve_output_style(false, true), OutputStyle::Plain);
}

#[test]
fn status_lines_render_per_style() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "installed ccm v1.0.0"),
        "installed ccm v1.0.0"
    );
    assert_eq!(
        render_status_line(OutputStyle::Plain, "warn", "not on PATH"),
        "warning: not on PATH"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "installed ccm v1.0.0"),
        "[OK] installed ccm v1.0.0"
    );
}

#[test]
fn skipped_verification_is_described_to_the_user() {
    let event = InstallEvent::Verified(VerificationOutcome::Skipped {
        reason: SkipReason::ManifestMissing,
        digest: "00".repeat(32),
    });
    let message = describe_event(&event).expect("must describe skipped verification");
    assert!(message.contains("no checksum manifest was published"));
    assert!(message.contains("unverified"));
}

#[test]
fn update_status_lines_report_variant_switch() {
    let status = UpdateStatus {
        installed: Some("v1.0.0".to_string()),
        latest: "v1.0.0".to_string(),
        update_available: Some(false),
        asset_mismatch: true,
        preferred_asset: "ccm-linux-x86_64-nc6.tar.gz".to_string(),
    };
    let lines = format_update_status_lines(&status, OutputStyle::Plain);
    assert_eq!(lines[0], "installed: v1.0.0");
    assert_eq!(lines[3], "up to date");
    assert!(lines[4].starts_with("warning: "));
}

#[test]
fn completions_script_names_the_binary() {
    let mut out = Vec::new();
    write_completions_script(CliCompletionShell::Bash, &mut out).expect("must write script");
    let script = String::from_utf8(out).expect("script must be utf-8");
    assert!(script.contains("ccmup"));
    assert!(script.contains("upgrade"));
}
