use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use scriptup_core::{
    ChannelRelease, ScriptLocation, ScriptVersion, UpdateError, UpdateSettings, VersionDocument,
};
use scriptup_security::{verify_artifact, verify_sha256, SignatureError};
use tracing::{debug, info, warn};

use crate::backup::backup_file_name;
use crate::throttle::ThrottleGate;

/// Blocking transport seam. The HTTP implementation lives in the CLI crate;
/// tests substitute an in-memory source.
pub trait ReleaseSource {
    fn fetch_version_document(&self) -> Result<VersionDocument, UpdateError>;

    /// Returns the raw bytes of the asset whose name exactly equals
    /// `asset_name` within the release tagged `tag`.
    fn fetch_release_asset(&self, tag: &str, asset_name: &str) -> Result<Vec<u8>, UpdateError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Checking,
    UpdateAvailable,
    Downloading,
    Verifying,
    Replacing,
    Succeeded,
    RolledBack,
    FailedUnrecoverable,
}

/// Per-invocation caller inputs, distinct from the durable settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub running_version: ScriptVersion,
    pub auto_update: bool,
    pub restart_after_update: bool,
    pub force_check: bool,
    pub skip_check: bool,
    pub show_dev_info: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Remote check suppressed by the caller's skip flag.
    CheckSkipped,
    /// Remote check suppressed by the throttle window.
    ThrottleSkipped,
    /// Metadata could not be fetched or interpreted; the current version
    /// stays in use.
    MetadataUnavailable,
    UpToDate {
        newer_elsewhere: Option<(String, ScriptVersion)>,
    },
    UpdateAvailable {
        version: ScriptVersion,
        notes: Vec<String>,
    },
    Updated {
        previous: ScriptVersion,
        installed: ScriptVersion,
        backup_path: PathBuf,
        restart_requested: bool,
    },
}

/// Single-pass update state machine. One invocation makes at most one
/// download/verify/replace attempt; there is no internal retry.
pub struct UpdateExecutor<'a, S: ReleaseSource> {
    location: &'a ScriptLocation,
    settings: &'a UpdateSettings,
    source: &'a S,
    throttle: ThrottleGate,
    phase: UpdatePhase,
    rename: Box<dyn FnMut(&Path, &Path) -> io::Result<()> + 'a>,
}

impl<'a, S: ReleaseSource> UpdateExecutor<'a, S> {
    pub fn new(location: &'a ScriptLocation, settings: &'a UpdateSettings, source: &'a S) -> Self {
        let throttle = ThrottleGate::for_script(location);
        Self::with_throttle(location, settings, source, throttle)
    }

    pub fn with_throttle(
        location: &'a ScriptLocation,
        settings: &'a UpdateSettings,
        source: &'a S,
        throttle: ThrottleGate,
    ) -> Self {
        Self {
            location,
            settings,
            source,
            throttle,
            phase: UpdatePhase::Idle,
            rename: Box::new(|from, to| fs::rename(from, to)),
        }
    }

    /// Substitutes the rename used during the replace step. Tests use this
    /// to simulate a promote that fails after the live script was moved
    /// aside.
    pub fn with_rename<F>(mut self, rename: F) -> Self
    where
        F: FnMut(&Path, &Path) -> io::Result<()> + 'a,
    {
        self.rename = Box::new(rename);
        self
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub fn run(&mut self, request: &UpdateRequest) -> Result<UpdateOutcome, UpdateError> {
        let result = self.run_inner(request);
        match &result {
            Ok(UpdateOutcome::Updated { .. }) => self.phase = UpdatePhase::Succeeded,
            Ok(_) => {}
            Err(err) => {
                warn!("update failed ({}): {err}", err.reason_code());
                // A replace failure leaves the previous script restored in
                // place, which is the rolled-back terminal state.
                self.phase = if self.phase == UpdatePhase::Replacing
                    && matches!(err, UpdateError::Replace(_))
                {
                    UpdatePhase::RolledBack
                } else {
                    UpdatePhase::FailedUnrecoverable
                };
            }
        }
        result
    }

    fn run_inner(&mut self, request: &UpdateRequest) -> Result<UpdateOutcome, UpdateError> {
        if request.skip_check {
            debug!("remote check skipped by caller flag");
            return Ok(UpdateOutcome::CheckSkipped);
        }
        if !self
            .throttle
            .should_check(self.settings.check_interval_hours, request.force_check)
        {
            debug!(
                "remote check throttled, interval is {}h",
                self.settings.check_interval_hours
            );
            return Ok(UpdateOutcome::ThrottleSkipped);
        }

        self.phase = UpdatePhase::Checking;
        let document = match self.source.fetch_version_document() {
            Ok(document) => document,
            Err(err) => {
                // Fetch failures never abort: the script stays usable
                // offline, and the stamp is left alone so the next run
                // retries immediately.
                warn!("version metadata unavailable: {err}");
                return Ok(UpdateOutcome::MetadataUnavailable);
            }
        };
        self.throttle.record_checked_now();

        let release = match document.resolve_channel(&self.settings.channel) {
            Ok(release) => release,
            Err(err) => {
                warn!("version metadata unusable: {err}");
                return Ok(UpdateOutcome::MetadataUnavailable);
            }
        };

        // The floor is evaluated before the ordinary newer-version check
        // and is fatal no matter what the auto-update flag says.
        release.check_forced_floor(&request.running_version)?;

        let newer_elsewhere = if request.show_dev_info
            || self.settings.show_dev_info
            || release.show_dev_info
        {
            document.newer_on_other_channel(&request.running_version, &release.channel)
        } else {
            None
        };
        if let Some((channel, version)) = &newer_elsewhere {
            info!("newer build {version} is published on channel '{channel}'");
        }

        if !release.is_newer_than(&request.running_version) {
            debug!(
                "running version {} is current on channel '{}'",
                request.running_version, release.channel
            );
            return Ok(UpdateOutcome::UpToDate { newer_elsewhere });
        }

        self.phase = UpdatePhase::UpdateAvailable;
        // The settings file provides the standing policy; the per-run flag
        // can only add to it, never disable it.
        let auto_update = request.auto_update || self.settings.auto_update;
        if !auto_update {
            info!(
                "update {} available on channel '{}' (auto-update off)",
                release.version, release.channel
            );
            return Ok(UpdateOutcome::UpdateAvailable {
                version: release.version,
                notes: release.notes,
            });
        }

        self.perform_update(request, &release)
    }

    fn perform_update(
        &mut self,
        request: &UpdateRequest,
        release: &ChannelRelease,
    ) -> Result<UpdateOutcome, UpdateError> {
        self.phase = UpdatePhase::Downloading;
        let tag = format!("v{}", release.version);
        let bytes = self
            .source
            .fetch_release_asset(&tag, self.location.file_name())?;
        info!(
            "downloaded {} bytes for {} {}",
            bytes.len(),
            self.location.file_name(),
            tag
        );

        if let Some(expected) = &release.sha256 {
            if !verify_sha256(&bytes, expected) {
                return Err(UpdateError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual: scriptup_security::sha256_hex(&bytes),
                });
            }
        }

        let staging = self.location.staging_path();
        remove_stale_staging(&staging);
        fs::write(&staging, &bytes)?;

        self.phase = UpdatePhase::Verifying;
        if let Err(err) = verify_artifact(
            &staging,
            &release.certificate_subject,
            &self.settings.trusted_root_keys,
        ) {
            remove_stale_staging(&staging);
            return Err(map_signature_error(err));
        }
        debug!(
            "signature chain and subject verified for {}",
            staging.display()
        );

        self.phase = UpdatePhase::Replacing;
        let backup_path = self.location.directory().join(backup_file_name(
            self.location.file_stem(),
            &request.running_version,
        ));
        replace_live_with(self.location.path(), &staging, &backup_path, &mut self.rename)?;
        info!(
            "installed {} {}, previous version backed up at {}",
            self.location.file_name(),
            release.version,
            backup_path.display()
        );

        Ok(UpdateOutcome::Updated {
            previous: request.running_version,
            installed: release.version,
            backup_path,
            restart_requested: request.restart_after_update || self.settings.restart_after_update,
        })
    }
}

/// Backup-then-swap as a unit: if promoting the staged file fails after the
/// live script was moved aside, the backup is put back (one attempt) before
/// the failure is reported. The rename operation is injected for tests.
pub(crate) fn replace_live_with<F>(
    live: &Path,
    staging: &Path,
    backup: &Path,
    mut rename: F,
) -> Result<(), UpdateError>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    rename(live, backup).map_err(|err| {
        remove_stale_staging(staging);
        UpdateError::Replace(format!(
            "failed to back up {} to {}: {err}",
            live.display(),
            backup.display()
        ))
    })?;

    if let Err(err) = rename(staging, live) {
        warn!(
            "failed to promote staged update {}: {err}",
            staging.display()
        );
        if let Err(restore_err) = rename(backup, live) {
            warn!(
                "failed to restore backup {} after aborted replace: {restore_err}",
                backup.display()
            );
        }
        remove_stale_staging(staging);
        return Err(UpdateError::Replace(format!(
            "failed to move staged update into {}: {err}",
            live.display()
        )));
    }

    Ok(())
}

fn remove_stale_staging(staging: &Path) {
    match fs::remove_file(staging) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            "failed to remove staged file {}: {err}",
            staging.display()
        ),
    }
}

fn map_signature_error(err: SignatureError) -> UpdateError {
    match err {
        SignatureError::SubjectMismatch { expected, actual } => {
            UpdateError::SignerMismatch { expected, actual }
        }
        other => UpdateError::SignatureInvalid(other.to_string()),
    }
}
