use std::path::PathBuf;

pub const PRIMARY_NAME: &str = "ccm";
pub const ALIAS_NAME: &str = "cursor-cli-manager";
pub const ASSET_PREFIX: &str = "ccm";
pub const ENTRYPOINT_DIR: &str = "ccm";
pub const CHECKSUMS_FILE_NAME: &str = "checksums.txt";
pub const CHECKSUMS_SIGNATURE_FILE_NAME: &str = "checksums.txt.sig";
pub const DEFAULT_REPO: &str = "baaaaaaaka/cursor_cli_manager";

/// Entrypoint location relative to a version directory (`ccm/ccm`).
pub fn entrypoint_rel_path() -> PathBuf {
    PathBuf::from(ENTRYPOINT_DIR).join(PRIMARY_NAME)
}
