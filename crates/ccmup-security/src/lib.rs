mod checksum;
mod ed25519;
mod verify;

pub use checksum::{sha256_file_hex, sha256_hex, verify_sha256, verify_sha256_file, verify_sha256_reader};
pub use ed25519::verify_manifest_signature_hex;
pub use verify::{
    verify_release_files, SkipReason, VerificationOutcome, VerificationPolicy, VerifyOptions,
};
