use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::SignatureError;

/// Verifies a detached hex-encoded Ed25519 signature. Returns Ok(false) for
/// a well-formed signature that does not match; malformed key or signature
/// material is an error, not a mismatch.
pub fn verify_ed25519_signature_hex(
    payload: &[u8],
    public_key_hex: &str,
    signature_hex: &str,
) -> Result<bool, SignatureError> {
    let public_key_bytes = hex::decode(public_key_hex.trim())
        .map_err(|_| SignatureError::Malformed("public key is not valid hex".to_string()))?;
    let signature_bytes = hex::decode(signature_hex.trim())
        .map_err(|_| SignatureError::Malformed("signature is not valid hex".to_string()))?;

    let public_key_array: [u8; 32] = public_key_bytes.try_into().map_err(|bytes: Vec<u8>| {
        SignatureError::Malformed(format!(
            "public key must be 32 bytes, got {}",
            bytes.len()
        ))
    })?;
    let signature_array: [u8; 64] = signature_bytes.try_into().map_err(|bytes: Vec<u8>| {
        SignatureError::Malformed(format!("signature must be 64 bytes, got {}", bytes.len()))
    })?;

    let verifying_key = VerifyingKey::from_bytes(&public_key_array)
        .map_err(|_| SignatureError::Malformed("invalid public key bytes".to_string()))?;
    let signature = Signature::from_bytes(&signature_array);

    Ok(verifying_key.verify(payload, &signature).is_ok())
}
