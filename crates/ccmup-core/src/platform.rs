use std::fmt;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::InstallError;
use crate::product::ASSET_PREFIX;

pub const NC6_MARKER_LIBRARIES: [&str; 2] = ["libtinfo.so.6", "libncursesw.so.6"];
pub const NC5_MARKER_LIBRARIES: [&str; 2] = ["libtinfo.so.5", "libncursesw.so.5"];

pub const LIBRARY_SEARCH_DIRS: [&str; 6] = [
    "/lib64",
    "/usr/lib64",
    "/lib",
    "/usr/lib",
    "/lib/x86_64-linux-gnu",
    "/usr/lib/x86_64-linux-gnu",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOs {
    Linux,
    MacOs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostArch {
    X86_64,
    Arm64,
}

/// Terminal runtime ABI the Linux bundle was linked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinuxVariant {
    Nc6,
    Nc5,
    Common,
}

impl HostOs {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
        }
    }
}

impl HostArch {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Arm64 => "arm64",
        }
    }
}

impl LinuxVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nc6 => "nc6",
            Self::Nc5 => "nc5",
            Self::Common => "common",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nc6" | "6" => Some(Self::Nc6),
            "nc5" | "5" => Some(Self::Nc5),
            "common" => Some(Self::Common),
            _ => None,
        }
    }

    pub fn asset_name(self) -> String {
        match self {
            Self::Nc6 => format!("{ASSET_PREFIX}-linux-x86_64-nc6.tar.gz"),
            Self::Nc5 => format!("{ASSET_PREFIX}-linux-x86_64-nc5.tar.gz"),
            Self::Common => format!("{ASSET_PREFIX}-linux-x86_64-glibc217.tar.gz"),
        }
    }

    /// Reverse lookup used when comparing an installed asset with the preferred one.
    pub fn from_asset_name(asset: &str) -> Option<Self> {
        [Self::Nc6, Self::Nc5, Self::Common]
            .into_iter()
            .find(|variant| variant.asset_name() == asset)
    }
}

impl fmt::Display for LinuxVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn parse_os(name: &str) -> Option<HostOs> {
    match name.trim().to_ascii_lowercase().as_str() {
        "linux" => Some(HostOs::Linux),
        "darwin" | "macos" => Some(HostOs::MacOs),
        _ => None,
    }
}

pub fn normalize_arch(machine: &str) -> String {
    let machine = machine.trim().to_ascii_lowercase();
    match machine.as_str() {
        "x86_64" | "amd64" => "x86_64".to_string(),
        "aarch64" | "arm64" => "arm64".to_string(),
        "" => "unknown".to_string(),
        _ => machine,
    }
}

fn parse_arch(machine: &str) -> Option<HostArch> {
    match normalize_arch(machine).as_str() {
        "x86_64" => Some(HostArch::X86_64),
        "arm64" => Some(HostArch::Arm64),
        _ => None,
    }
}

pub trait LibraryProbe {
    /// Output of the dynamic linker cache listing, if the cache could be read.
    fn linker_cache_listing(&self) -> Option<String>;

    fn library_exists(&self, dir: &Path, name: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HostLibraryProbe;

impl LibraryProbe for HostLibraryProbe {
    fn linker_cache_listing(&self) -> Option<String> {
        for program in ["ldconfig", "/sbin/ldconfig"] {
            match Command::new(program).arg("-p").output() {
                Ok(output) if output.status.success() => {
                    return Some(String::from_utf8_lossy(&output.stdout).into_owned());
                }
                Ok(output) => debug!(program, status = %output.status, "linker cache listing failed"),
                Err(err) => debug!(program, error = %err, "linker cache listing unavailable"),
            }
        }
        None
    }

    fn library_exists(&self, dir: &Path, name: &str) -> bool {
        dir.join(name).exists()
    }
}

fn listing_has_any(listing: &str, markers: &[&str]) -> bool {
    listing.lines().any(|line| {
        line.split_whitespace()
            .next()
            .is_some_and(|soname| markers.contains(&soname))
    })
}

fn dirs_have_any(probe: &dyn LibraryProbe, markers: &[&str]) -> bool {
    LIBRARY_SEARCH_DIRS.iter().any(|dir| {
        markers
            .iter()
            .any(|marker| probe.library_exists(Path::new(dir), marker))
    })
}

pub fn detect_linux_variant(probe: &dyn LibraryProbe) -> LinuxVariant {
    let listing = probe.linker_cache_listing();
    let has = |markers: &[&str]| {
        listing
            .as_deref()
            .is_some_and(|listing| listing_has_any(listing, markers))
            || dirs_have_any(probe, markers)
    };

    if has(&NC6_MARKER_LIBRARIES) {
        LinuxVariant::Nc6
    } else if has(&NC5_MARKER_LIBRARIES) {
        LinuxVariant::Nc5
    } else {
        LinuxVariant::Common
    }
}

/// Explicit overrides for the platform inputs; `None` means "use the host".
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformRequest<'a> {
    pub os: Option<&'a str>,
    pub arch: Option<&'a str>,
    pub variant: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub os: HostOs,
    pub arch: HostArch,
    pub variant: Option<LinuxVariant>,
    pub name: String,
}

pub fn resolve_asset(
    request: &PlatformRequest<'_>,
    probe: &dyn LibraryProbe,
) -> Result<AssetDescriptor, InstallError> {
    let os_name = request.os.unwrap_or(std::env::consts::OS);
    let arch_name = request.arch.unwrap_or(std::env::consts::ARCH);
    let unsupported = || InstallError::UnsupportedPlatform {
        os: os_name.trim().to_ascii_lowercase(),
        arch: normalize_arch(arch_name),
    };

    let os = parse_os(os_name).ok_or_else(unsupported)?;
    let arch = parse_arch(arch_name).ok_or_else(unsupported)?;

    match (os, arch) {
        (HostOs::Linux, HostArch::X86_64) => {
            let variant = match request.variant.and_then(LinuxVariant::parse) {
                Some(variant) => variant,
                None => detect_linux_variant(probe),
            };
            debug!(variant = %variant, "resolved linux runtime variant");
            Ok(AssetDescriptor {
                os,
                arch,
                variant: Some(variant),
                name: variant.asset_name(),
            })
        }
        (HostOs::MacOs, _) => Ok(AssetDescriptor {
            os,
            arch,
            variant: None,
            name: format!("{ASSET_PREFIX}-macos-{}.tar.gz", arch.as_str()),
        }),
        (HostOs::Linux, HostArch::Arm64) => Err(unsupported()),
    }
}
