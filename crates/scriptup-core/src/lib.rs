mod error;
mod metadata;
mod settings;
mod version;

pub use error::UpdateError;
pub use metadata::{ChangelogEntry, ChannelInfo, ChannelRelease, VersionDocument};
pub use settings::{ScriptLocation, UpdateSettings};
pub use version::ScriptVersion;

#[cfg(test)]
mod tests;
