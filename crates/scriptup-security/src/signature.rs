use std::fs;
use std::path::Path;

use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::verify_ed25519_signature_hex;

const BEGIN_MARKER: &str = "# ---- BEGIN SCRIPTUP SIGNATURE ----";
const END_MARKER: &str = "# ---- END SCRIPTUP SIGNATURE ----";
const BLOCK_LINE_WIDTH: usize = 64;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("artifact carries no signature block")]
    MissingBlock,

    #[error("malformed signature material: {0}")]
    Malformed(String),

    #[error("signing certificate does not chain to a trusted root")]
    UntrustedChain,

    #[error("artifact signature does not match the signed content")]
    InvalidSignature,

    #[error("signer subject mismatch: expected '{expected}', got '{actual}'")]
    SubjectMismatch { expected: String, actual: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Embedded trailer carried at the end of a signed script. The certificate
/// signature binds subject and signer key together under a root key; the
/// artifact signature covers every byte before the trailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    pub signer_subject: String,
    pub signer_public_key: String,
    pub certificate_signature: String,
    pub artifact_signature: String,
}

impl SignatureBlock {
    /// Signs `payload` with `signer` and certifies the signer under `root`.
    /// Used by release tooling and tests; verification never needs keys
    /// beyond the trusted root set.
    pub fn issue(payload: &[u8], subject: &str, signer: &SigningKey, root: &SigningKey) -> Self {
        let signer_public_key = hex::encode(signer.verifying_key().to_bytes());
        let certificate_signature =
            hex::encode(root.sign(&certificate_message(subject, &signer_public_key)).to_bytes());
        let artifact_signature = hex::encode(signer.sign(payload).to_bytes());
        Self {
            signer_subject: subject.to_string(),
            signer_public_key,
            certificate_signature,
            artifact_signature,
        }
    }
}

fn certificate_message(subject: &str, signer_public_key_hex: &str) -> Vec<u8> {
    format!("{subject}\n{signer_public_key_hex}").into_bytes()
}

/// Splits a signed artifact into its payload bytes and the decoded trailer.
pub fn extract_signature_block(raw: &[u8]) -> Result<(&[u8], SignatureBlock), SignatureError> {
    let marker = BEGIN_MARKER.as_bytes();
    let mut begin = None;
    let mut offset = 0usize;
    while offset + marker.len() <= raw.len() {
        if raw[offset..].starts_with(marker) && (offset == 0 || raw[offset - 1] == b'\n') {
            begin = Some(offset);
        }
        offset += 1;
    }
    let begin = begin.ok_or(SignatureError::MissingBlock)?;

    let trailer = std::str::from_utf8(&raw[begin..])
        .map_err(|_| SignatureError::Malformed("signature trailer is not UTF-8".to_string()))?;

    let mut encoded = String::new();
    let mut terminated = false;
    for line in trailer.lines().skip(1) {
        let line = line.trim();
        if line == END_MARKER {
            terminated = true;
            break;
        }
        encoded.push_str(line.trim_start_matches('#').trim());
    }
    if !terminated {
        return Err(SignatureError::Malformed(
            "signature trailer is missing its end marker".to_string(),
        ));
    }

    let decoded = hex::decode(&encoded)
        .map_err(|_| SignatureError::Malformed("signature block is not valid hex".to_string()))?;
    let block: SignatureBlock = serde_json::from_slice(&decoded)
        .map_err(|err| SignatureError::Malformed(format!("signature block is not valid JSON: {err}")))?;

    Ok((&raw[..begin], block))
}

/// Renders payload plus trailer into the on-disk signed artifact form.
pub fn render_signed_artifact(payload: &[u8], block: &SignatureBlock) -> Vec<u8> {
    let encoded = hex::encode(
        serde_json::to_vec(block).expect("signature block serialization cannot fail"),
    );

    let mut out = payload.to_vec();
    if !out.ends_with(b"\n") {
        out.push(b'\n');
    }
    out.extend_from_slice(BEGIN_MARKER.as_bytes());
    out.push(b'\n');
    for chunk in encoded.as_bytes().chunks(BLOCK_LINE_WIDTH) {
        out.extend_from_slice(b"# ");
        out.extend_from_slice(chunk);
        out.push(b'\n');
    }
    out.extend_from_slice(END_MARKER.as_bytes());
    out.push(b'\n');
    out
}

/// Full verification: trailer present, certificate chained to one of the
/// trusted roots, artifact signature valid, signer subject an exact match.
pub fn verify_artifact_bytes(
    raw: &[u8],
    expected_subject: &str,
    trusted_root_keys: &[String],
) -> Result<(), SignatureError> {
    let (payload, block) = extract_signature_block(raw)?;

    let message = certificate_message(&block.signer_subject, &block.signer_public_key);
    let mut chained = false;
    for root in trusted_root_keys {
        if verify_ed25519_signature_hex(&message, root, &block.certificate_signature)? {
            chained = true;
            break;
        }
    }
    if !chained {
        return Err(SignatureError::UntrustedChain);
    }

    if !verify_ed25519_signature_hex(
        payload,
        &block.signer_public_key,
        &block.artifact_signature,
    )? {
        return Err(SignatureError::InvalidSignature);
    }

    if block.signer_subject != expected_subject {
        return Err(SignatureError::SubjectMismatch {
            expected: expected_subject.to_string(),
            actual: block.signer_subject,
        });
    }

    Ok(())
}

pub fn verify_artifact(
    path: &Path,
    expected_subject: &str,
    trusted_root_keys: &[String],
) -> Result<(), SignatureError> {
    let raw = fs::read(path)?;
    verify_artifact_bytes(&raw, expected_subject, trusted_root_keys)
}
