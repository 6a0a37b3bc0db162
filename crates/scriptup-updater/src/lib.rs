mod backup;
mod executor;
mod throttle;

pub use backup::{
    backup_file_name, find_latest_backup, quarantine_file_name, rollback, RollbackOutcome,
};
pub use executor::{ReleaseSource, UpdateExecutor, UpdateOutcome, UpdatePhase, UpdateRequest};
pub use throttle::{unix_now, ThrottleGate};
