use anyhow::{Context, Result};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Checks a detached hex signature over the raw checksum manifest bytes.
pub fn verify_manifest_signature_hex(
    manifest: &[u8],
    public_key_hex: &str,
    signature_hex: &str,
) -> Result<bool> {
    let public_key_bytes = hex::decode(public_key_hex.trim())
        .context("failed to decode manifest public key hex")?;
    let signature_bytes = hex::decode(signature_hex.trim())
        .context("failed to decode manifest signature hex")?;
    let public_key_len = public_key_bytes.len();
    let signature_len = signature_bytes.len();

    let public_key_array: [u8; 32] = public_key_bytes.try_into().map_err(|_| {
        anyhow::anyhow!(
            "invalid manifest public key length: expected 32 bytes, got {}",
            public_key_len
        )
    })?;
    let signature_array: [u8; 64] = signature_bytes.try_into().map_err(|_| {
        anyhow::anyhow!(
            "invalid manifest signature length: expected 64 bytes, got {}",
            signature_len
        )
    })?;

    let verifying_key = VerifyingKey::from_bytes(&public_key_array)
        .context("invalid manifest public key bytes")?;
    let signature = Signature::from_bytes(&signature_array);

    Ok(verifying_key.verify(manifest, &signature).is_ok())
}
