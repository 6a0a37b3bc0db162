use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use scriptup_core::ScriptLocation;
use tracing::{debug, warn};

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Gate for remote metadata checks, backed by a single timestamp file.
/// Absence or corruption of the file means "never checked".
#[derive(Debug, Clone)]
pub struct ThrottleGate {
    stamp_path: PathBuf,
}

impl ThrottleGate {
    pub fn new(stamp_path: impl Into<PathBuf>) -> Self {
        Self {
            stamp_path: stamp_path.into(),
        }
    }

    pub fn for_script(location: &ScriptLocation) -> Self {
        Self::new(env::temp_dir().join(format!("{}.lastcheck", location.file_name())))
    }

    pub fn stamp_path(&self) -> &Path {
        &self.stamp_path
    }

    pub fn should_check(&self, interval_hours: u64, force: bool) -> bool {
        self.should_check_at(unix_now(), interval_hours, force)
    }

    pub fn should_check_at(&self, now: u64, interval_hours: u64, force: bool) -> bool {
        if interval_hours == 0 {
            return true;
        }
        if force {
            return true;
        }
        match self.read_stamp() {
            Some(last_checked) => {
                now >= last_checked.saturating_add(interval_hours.saturating_mul(3600))
            }
            None => true,
        }
    }

    fn read_stamp(&self) -> Option<u64> {
        let raw = match fs::read_to_string(&self.stamp_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(
                    "failed to read throttle stamp {}: {err}",
                    self.stamp_path.display()
                );
                return None;
            }
        };

        match raw.trim().parse::<u64>() {
            Ok(timestamp) => Some(timestamp),
            Err(_) => {
                warn!(
                    "throttle stamp {} is corrupt, treating as never checked",
                    self.stamp_path.display()
                );
                None
            }
        }
    }

    /// Persists the check time. Called only after a successful metadata
    /// fetch so a failed fetch does not suppress an early retry.
    pub fn record_checked_now(&self) {
        self.record_checked(unix_now());
    }

    pub fn record_checked(&self, timestamp: u64) {
        if let Err(err) = fs::write(&self.stamp_path, format!("{timestamp}\n")) {
            warn!(
                "failed to write throttle stamp {}: {err}",
                self.stamp_path.display()
            );
            return;
        }
        debug!(
            "recorded metadata check at {timestamp} in {}",
            self.stamp_path.display()
        );
    }
}
