mod checksum;
mod ed25519;
mod signature;

pub use checksum::{sha256_hex, verify_sha256};
pub use ed25519::verify_ed25519_signature_hex;
pub use signature::{
    extract_signature_block, render_signed_artifact, verify_artifact, verify_artifact_bytes,
    SignatureBlock, SignatureError,
};
