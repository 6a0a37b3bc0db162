use std::io;

use thiserror::Error;

use crate::ScriptVersion;

/// Failure taxonomy for the whole update pipeline. Each variant carries a
/// stable reason code so automation can branch without parsing messages.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("metadata error: {0}")]
    Metadata(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("running version {running} is below the forced-update floor {floor}; update required")]
    ForcedUpdateRequired {
        running: ScriptVersion,
        floor: ScriptVersion,
    },

    #[error("release '{tag}' has no asset named '{asset}'")]
    AssetNotFound { asset: String, tag: String },

    #[error("download failed: {0}")]
    Download(String),

    #[error("artifact digest mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("signer subject mismatch: expected '{expected}', got '{actual}'")]
    SignerMismatch { expected: String, actual: String },

    #[error("replace failed: {0}")]
    Replace(String),

    #[error("no backup found in '{directory}'")]
    NoBackupFound { directory: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl UpdateError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Metadata(_) => "metadata_error",
            Self::Config(_) => "config_error",
            Self::ForcedUpdateRequired { .. } => "forced_update_required",
            Self::AssetNotFound { .. } => "asset_not_found",
            Self::Download(_) => "download_failed",
            Self::ChecksumMismatch { .. } => "checksum_mismatch",
            Self::SignatureInvalid(_) => "signature_invalid",
            Self::SignerMismatch { .. } => "signer_mismatch",
            Self::Replace(_) => "replace_failed",
            Self::NoBackupFound { .. } => "no_backup_found",
            Self::Io(_) => "io_error",
        }
    }

    /// Transient errors never abort the run; the executor degrades to the
    /// current version and logs instead.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Metadata(_))
    }
}
