use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use scriptup_core::{ScriptLocation, ScriptVersion, UpdateError};
use tracing::{info, warn};

use crate::throttle::unix_now;

pub fn backup_file_name(script_stem: &str, version: &ScriptVersion) -> String {
    format!("{script_stem}_v{version}.bak")
}

pub fn quarantine_file_name(script_file_name: &str, timestamp: u64) -> String {
    format!("{script_file_name}.broken_{timestamp}")
}

/// First free quarantine path for the given second. Whole-second timestamps
/// collide when rollbacks run back to back; an earlier quarantined copy must
/// never be overwritten.
pub(crate) fn next_quarantine_path(
    directory: &Path,
    script_file_name: &str,
    timestamp: u64,
) -> PathBuf {
    let base = directory.join(quarantine_file_name(script_file_name, timestamp));
    if !base.exists() {
        return base;
    }
    let mut suffix = 1u64;
    loop {
        let candidate = directory.join(format!(
            "{}-{suffix}",
            quarantine_file_name(script_file_name, timestamp)
        ));
        if !candidate.exists() {
            return candidate;
        }
        suffix += 1;
    }
}

/// Most recently modified `<stem>_v*.bak` in the script directory, if any.
/// Multiple backup generations may accumulate; only the newest is eligible.
pub fn find_latest_backup(
    directory: &Path,
    script_stem: &str,
) -> Result<Option<PathBuf>, UpdateError> {
    let prefix = format!("{script_stem}_v");
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(&prefix) || !name.ends_with(".bak") {
            continue;
        }
        if !entry.file_type()?.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        let replace = match &newest {
            Some((newest_modified, _)) => modified > *newest_modified,
            None => true,
        };
        if replace {
            newest = Some((modified, entry.path()));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackOutcome {
    pub restored_backup: PathBuf,
    pub quarantined: Option<PathBuf>,
}

/// Explicit user-invoked rollback: quarantine the live script, then promote
/// the most recent backup into its place. Nothing is ever deleted.
pub fn rollback(location: &ScriptLocation) -> Result<RollbackOutcome, UpdateError> {
    let backup = find_latest_backup(location.directory(), location.file_stem())?.ok_or_else(
        || UpdateError::NoBackupFound {
            directory: location.directory().display().to_string(),
        },
    )?;

    let quarantined = if location.path().exists() {
        let quarantine_path =
            next_quarantine_path(location.directory(), location.file_name(), unix_now());
        fs::rename(location.path(), &quarantine_path).map_err(|err| {
            UpdateError::Replace(format!(
                "failed to quarantine {}: {err}",
                location.path().display()
            ))
        })?;
        info!(
            "quarantined broken script at {}",
            quarantine_path.display()
        );
        Some(quarantine_path)
    } else {
        warn!(
            "live script {} is missing, restoring backup anyway",
            location.path().display()
        );
        None
    };

    fs::rename(&backup, location.path()).map_err(|err| {
        UpdateError::Replace(format!(
            "failed to restore backup {}: {err}",
            backup.display()
        ))
    })?;
    info!(
        "restored {} from backup {}",
        location.path().display(),
        backup.display()
    );

    Ok(RollbackOutcome {
        restored_backup: backup,
        quarantined,
    })
}
