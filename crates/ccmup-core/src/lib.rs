mod error;
mod manifest;
mod platform;
mod product;
mod version;

pub use error::{find_install_error, ErrorClass, InstallError};
pub use manifest::ChecksumManifest;
pub use platform::{
    detect_linux_variant, normalize_arch, parse_os, resolve_asset, AssetDescriptor, HostArch,
    HostLibraryProbe, HostOs, LibraryProbe, LinuxVariant, PlatformRequest, LIBRARY_SEARCH_DIRS,
    NC5_MARKER_LIBRARIES, NC6_MARKER_LIBRARIES,
};
pub use product::{
    entrypoint_rel_path, ALIAS_NAME, ASSET_PREFIX, CHECKSUMS_FILE_NAME,
    CHECKSUMS_SIGNATURE_FILE_NAME, DEFAULT_REPO, ENTRYPOINT_DIR, PRIMARY_NAME,
};
pub use version::{compare_versions, is_version_newer, ReleaseVersion};

#[cfg(test)]
mod tests;
