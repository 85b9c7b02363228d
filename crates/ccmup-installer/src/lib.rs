mod exposure;
mod fs_utils;
mod interrupt;
mod layout;
mod lock;
mod protocol;
mod receipts;
mod repair;
mod store;
mod update;

pub use exposure::{link_commands, LinkFailure, LinkReport};
pub use layout::{default_bin_dir, default_install_root, InstallLayout};
pub use lock::{inspect_lock, read_lock_owner, unlock, InstallLock, LockOwner, LockState, UnlockOutcome};
pub use protocol::{run_install, InstallEvent, InstallOutcome, InstallRequest};
pub use receipts::{read_version_receipt, write_version_receipt, VersionReceipt, RECEIPT_FILE_NAME};
pub use repair::{check_runnable, RepairBudget, Runnability};
pub use store::{entrypoint_problem, sanitize_tag, validate_entrypoint, StagedVersion, VersionedStore};
pub use update::{check_for_update, UpdateStatus};
