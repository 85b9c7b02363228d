use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::*;

#[derive(Default)]
struct FakeProbe {
    listing: Option<String>,
    files: HashSet<PathBuf>,
    probes: Cell<usize>,
}

impl FakeProbe {
    fn with_listing(listing: &str) -> Self {
        Self {
            listing: Some(listing.to_string()),
            ..Self::default()
        }
    }

    fn with_file(dir: &str, name: &str) -> Self {
        let mut probe = Self::default();
        probe.files.insert(Path::new(dir).join(name));
        probe
    }
}

impl LibraryProbe for FakeProbe {
    fn linker_cache_listing(&self) -> Option<String> {
        self.probes.set(self.probes.get() + 1);
        self.listing.clone()
    }

    fn library_exists(&self, dir: &Path, name: &str) -> bool {
        self.probes.set(self.probes.get() + 1);
        self.files.contains(&dir.join(name))
    }
}

fn linux(variant: Option<&str>) -> PlatformRequest<'_> {
    PlatformRequest {
        os: Some("Linux"),
        arch: Some("x86_64"),
        variant,
    }
}

#[test]
fn normalize_arch_maps_aliases_to_canonical_tokens() {
    assert_eq!(normalize_arch("amd64"), "x86_64");
    assert_eq!(normalize_arch("X86_64"), "x86_64");
    assert_eq!(normalize_arch("aarch64"), "arm64");
    assert_eq!(normalize_arch("arm64"), "arm64");
    assert_eq!(normalize_arch("riscv64"), "riscv64");
    assert_eq!(normalize_arch(""), "unknown");
}

#[test]
fn supported_tuples_map_to_fixed_asset_names() {
    let probe = FakeProbe::default();
    let cases = [
        (linux(Some("nc6")), "ccm-linux-x86_64-nc6.tar.gz"),
        (linux(Some("6")), "ccm-linux-x86_64-nc6.tar.gz"),
        (linux(Some("nc5")), "ccm-linux-x86_64-nc5.tar.gz"),
        (linux(Some("common")), "ccm-linux-x86_64-glibc217.tar.gz"),
        (
            PlatformRequest {
                os: Some("Darwin"),
                arch: Some("x86_64"),
                variant: None,
            },
            "ccm-macos-x86_64.tar.gz",
        ),
        (
            PlatformRequest {
                os: Some("darwin"),
                arch: Some("aarch64"),
                variant: None,
            },
            "ccm-macos-arm64.tar.gz",
        ),
        (
            PlatformRequest {
                os: Some("macos"),
                arch: Some("arm64"),
                variant: None,
            },
            "ccm-macos-arm64.tar.gz",
        ),
    ];

    for (request, expected) in cases {
        let asset = resolve_asset(&request, &probe).expect("must resolve supported platform");
        assert_eq!(asset.name, expected, "request: {request:?}");
    }
}

#[test]
fn explicit_variant_skips_host_probing() {
    let probe = FakeProbe::default();
    resolve_asset(&linux(Some("nc5")), &probe).expect("must resolve");
    assert_eq!(probe.probes.get(), 0);
}

#[test]
fn unknown_variant_override_falls_back_to_probe() {
    let probe = FakeProbe::with_listing("\tlibtinfo.so.6 (libc6,x86-64) => /lib/libtinfo.so.6\n");
    let asset = resolve_asset(&linux(Some("nc7")), &probe).expect("must resolve");
    assert_eq!(asset.variant, Some(LinuxVariant::Nc6));
}

#[test]
fn unsupported_platforms_fail_with_distinct_error() {
    let probe = FakeProbe::default();
    let cases = [
        ("Linux", "aarch64"),
        ("Linux", "i686"),
        ("Windows", "x86_64"),
        ("FreeBSD", "amd64"),
        ("Darwin", "ppc"),
    ];
    for (os, arch) in cases {
        let err = resolve_asset(
            &PlatformRequest {
                os: Some(os),
                arch: Some(arch),
                variant: None,
            },
            &probe,
        )
        .expect_err("unsupported platform must fail");
        assert!(
            matches!(err, InstallError::UnsupportedPlatform { .. }),
            "unexpected error for {os}/{arch}: {err}"
        );
        assert_eq!(err.exit_code(), 10);
        assert_eq!(err.class(), ErrorClass::Environment);
    }
}

#[test]
fn unsupported_linux_arch_never_probes_libraries() {
    let probe = FakeProbe::default();
    let _ = resolve_asset(
        &PlatformRequest {
            os: Some("Linux"),
            arch: Some("arm64"),
            variant: None,
        },
        &probe,
    );
    assert_eq!(probe.probes.get(), 0);
}

#[test]
fn variant_detection_prefers_abi6_from_linker_cache() {
    let listing = "2 libs found in cache `/etc/ld.so.cache'\n\tlibtinfo.so.5 (libc6,x86-64) => /lib/libtinfo.so.5\n\tlibncursesw.so.6 (libc6,x86-64) => /lib/libncursesw.so.6\n";
    assert_eq!(
        detect_linux_variant(&FakeProbe::with_listing(listing)),
        LinuxVariant::Nc6
    );
}

#[test]
fn variant_detection_reads_abi5_from_linker_cache() {
    let listing = "\tlibtinfo.so.5 (libc6,x86-64) => /lib/libtinfo.so.5\n";
    assert_eq!(
        detect_linux_variant(&FakeProbe::with_listing(listing)),
        LinuxVariant::Nc5
    );
}

#[test]
fn variant_detection_falls_back_to_library_directories() {
    let probe = FakeProbe::with_file("/usr/lib/x86_64-linux-gnu", "libtinfo.so.5");
    assert_eq!(detect_linux_variant(&probe), LinuxVariant::Nc5);

    let probe = FakeProbe::with_file("/lib64", "libncursesw.so.6");
    assert_eq!(detect_linux_variant(&probe), LinuxVariant::Nc6);
}

#[test]
fn variant_detection_without_markers_is_common() {
    let probe = FakeProbe::with_listing("\tlibc.so.6 (libc6,x86-64) => /lib/libc.so.6\n");
    assert_eq!(detect_linux_variant(&probe), LinuxVariant::Common);
}

#[test]
fn linker_cache_substring_does_not_count_as_marker() {
    let probe = FakeProbe::with_listing("\tlibtinfo.so.60 (libc6,x86-64) => /lib/libtinfo.so.60\n");
    assert_eq!(detect_linux_variant(&probe), LinuxVariant::Common);
}

#[test]
fn variant_round_trips_through_asset_name() {
    for variant in [LinuxVariant::Nc6, LinuxVariant::Nc5, LinuxVariant::Common] {
        assert_eq!(
            LinuxVariant::from_asset_name(&variant.asset_name()),
            Some(variant)
        );
    }
    assert_eq!(LinuxVariant::from_asset_name("ccm-macos-arm64.tar.gz"), None);
}

#[test]
fn manifest_parse_skips_comments_and_short_digests() {
    let raw = "\n# comment\nDEADBEEFdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef  ccm-linux-x86_64-glibc217.tar.gz\nabc  short-digest\nonlyonefield\nabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcd *other.tar.gz\n";
    let manifest = ChecksumManifest::parse(raw);
    assert_eq!(manifest.len(), 2);
    assert_eq!(
        manifest.digest_for("ccm-linux-x86_64-glibc217.tar.gz"),
        Some("deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef")
    );
    assert!(manifest.digest_for("other.tar.gz").is_some());
    assert!(manifest.digest_for("short-digest").is_none());
}

#[test]
fn manifest_without_matching_line_has_no_digest() {
    let manifest = ChecksumManifest::parse(
        "0000000000000000000000000000000000000000000000000000000000000000  something-else\n",
    );
    assert!(manifest.digest_for("ccm-macos-arm64.tar.gz").is_none());
}

#[test]
fn version_comparison_is_tolerant() {
    assert_eq!(is_version_newer("0.5.6", "0.5.5"), Some(true));
    assert_eq!(is_version_newer("v0.5.6", "0.5.6"), Some(false));
    assert_eq!(is_version_newer("0.5.6", "0.5.6"), Some(false));
    assert_eq!(is_version_newer("0.6", "0.5.9"), Some(true));
    assert_eq!(is_version_newer("1.2.3.4", "1.2.3"), Some(true));
    assert_eq!(is_version_newer("not-a-version", "0.5.6"), None);
    assert_eq!(compare_versions("v1.0.0", "1.0"), Some(Ordering::Equal));
}

#[test]
fn version_comparison_stops_at_first_non_digit() {
    assert_eq!(is_version_newer("1.2.3", "1.2.3-rc1"), Some(false));
    assert_eq!(is_version_newer("1.2.3-rc1", "1.2.3"), Some(false));
    assert_eq!(compare_versions("1.2.3-rc1", "1.2.3.0"), Some(Ordering::Equal));
    assert_eq!(compare_versions("1.2.3", "1.2.3.0"), Some(Ordering::Equal));
    assert_eq!(is_version_newer("0.6.0-rc1", "0.5.9"), Some(true));
    assert_eq!(is_version_newer("1.2.4", "1.2.3-rc1"), Some(true));
    assert_eq!(compare_versions("2.x.5", "2"), Some(Ordering::Equal));
}

#[test]
fn release_version_strips_v_prefix() {
    let version = ReleaseVersion::parse(" v1.2.3 ");
    assert_eq!(version.tag(), "v1.2.3");
    assert_eq!(version.version(), "1.2.3");
    assert!(version.is_comparable());
    assert!(!ReleaseVersion::parse("latest-1771000000").is_comparable());
}

#[test]
fn install_error_exit_codes_are_distinct() {
    let errors = [
        InstallError::UnsupportedPlatform {
            os: "plan9".to_string(),
            arch: "mips".to_string(),
        },
        InstallError::MissingDownloadTool,
        InstallError::ChecksumMismatch {
            asset: "a".to_string(),
            expected: "b".to_string(),
            actual: "c".to_string(),
        },
        InstallError::MissingExtractionTool {
            tool: "tar".to_string(),
        },
        InstallError::InvalidBundle {
            reason: "missing entrypoint".to_string(),
        },
        InstallError::InstallInProgress {
            lock: PathBuf::from("/tmp/root/.lock"),
            owner: None,
        },
        InstallError::NotRunnable {
            reason: "entrypoint missing".to_string(),
            root: PathBuf::from("/tmp/root"),
        },
        InstallError::VerificationRequired {
            asset: "a".to_string(),
            reason: "no manifest".to_string(),
        },
        InstallError::Config("bad".to_string()),
    ];

    let codes: HashSet<i32> = errors.iter().map(InstallError::exit_code).collect();
    assert_eq!(codes.len(), errors.len());
    assert!(codes.iter().all(|code| *code != 0 && *code != 2));
}

#[test]
fn only_bundle_corruption_triggers_repair() {
    assert!(InstallError::InvalidBundle {
        reason: "x".to_string()
    }
    .triggers_repair());
    assert!(InstallError::StorePlacement {
        path: PathBuf::from("/x"),
        reason: "x".to_string()
    }
    .triggers_repair());
    assert!(!InstallError::NotRunnable {
        reason: "x".to_string(),
        root: PathBuf::from("/x")
    }
    .triggers_repair());
    assert!(!InstallError::MissingDownloadTool.triggers_repair());
    assert!(!InstallError::ChecksumMismatch {
        asset: "a".to_string(),
        expected: "b".to_string(),
        actual: "c".to_string()
    }
    .triggers_repair());
}

#[test]
fn lock_error_message_names_lock_and_remedy() {
    let err = InstallError::InstallInProgress {
        lock: PathBuf::from("/tmp/root/.lock"),
        owner: Some("pid=42 host=box".to_string()),
    };
    let message = err.to_string();
    assert!(message.contains("install/upgrade is in progress"));
    assert!(message.contains("/tmp/root/.lock"));
    assert!(message.contains("pid=42 host=box"));
    assert!(message.contains("ccmup unlock"));
}

#[test]
fn find_install_error_walks_context_chain() {
    let err = anyhow::Error::new(InstallError::MissingDownloadTool)
        .context("failed to download asset")
        .context("install failed");
    let found = find_install_error(&err).expect("must find categorized error");
    assert_eq!(found.exit_code(), 11);

    let plain = anyhow::anyhow!("plain failure");
    assert!(find_install_error(&plain).is_none());
}

#[test]
fn entrypoint_rel_path_is_nested_bundle_binary() {
    assert_eq!(entrypoint_rel_path(), Path::new("ccm").join("ccm"));
}
