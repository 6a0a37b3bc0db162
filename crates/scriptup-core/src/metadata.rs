use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ScriptVersion, UpdateError};

/// Remote version document: one latest-version pointer per channel plus a
/// changelog keyed by version string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDocument {
    pub channels: BTreeMap<String, ChannelInfo>,
    #[serde(default)]
    pub changelog: BTreeMap<String, ChangelogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub version: ScriptVersion,
    #[serde(rename = "forceUpdateBelowVersion")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_update_below_version: Option<ScriptVersion>,
    #[serde(rename = "showDevInfo", default)]
    pub show_dev_info: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(rename = "CertificateSubject")]
    pub certificate_subject: String,
    #[serde(rename = "Sha256", default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// A channel resolved against the changelog: everything the executor needs
/// to decide on and trust one release.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRelease {
    pub channel: String,
    pub version: ScriptVersion,
    pub force_update_below_version: Option<ScriptVersion>,
    pub show_dev_info: bool,
    pub notes: Vec<String>,
    pub certificate_subject: String,
    pub sha256: Option<String>,
}

impl VersionDocument {
    pub fn from_json_str(input: &str) -> Result<Self, UpdateError> {
        serde_json::from_str(input)
            .map_err(|err| UpdateError::Metadata(format!("invalid version document: {err}")))
    }

    /// Every referenced channel version must resolve to a changelog entry;
    /// the entry carries the trust anchor for that release.
    pub fn resolve_channel(&self, channel: &str) -> Result<ChannelRelease, UpdateError> {
        let info = self.channels.get(channel).ok_or_else(|| {
            UpdateError::Metadata(format!("channel '{channel}' not present in version document"))
        })?;

        let entry = self
            .changelog
            .iter()
            .find(|(version, _)| {
                version
                    .parse::<ScriptVersion>()
                    .map(|parsed| parsed == info.version)
                    .unwrap_or(false)
            })
            .map(|(_, entry)| entry)
            .ok_or_else(|| {
                UpdateError::Metadata(format!(
                    "channel '{channel}' points at version {} with no changelog entry",
                    info.version
                ))
            })?;

        Ok(ChannelRelease {
            channel: channel.to_string(),
            version: info.version,
            force_update_below_version: info.force_update_below_version,
            show_dev_info: info.show_dev_info,
            notes: entry.notes.clone(),
            certificate_subject: entry.certificate_subject.clone(),
            sha256: entry.sha256.clone(),
        })
    }

    /// Informational side query: does some other channel publish a version
    /// newer than `current`? Never participates in forced-update decisions.
    pub fn newer_on_other_channel(
        &self,
        current: &ScriptVersion,
        active_channel: &str,
    ) -> Option<(String, ScriptVersion)> {
        self.channels
            .iter()
            .filter(|(name, _)| name.as_str() != active_channel)
            .filter(|(_, info)| info.version.is_newer_than(current))
            .max_by_key(|(_, info)| info.version)
            .map(|(name, info)| (name.clone(), info.version))
    }
}

impl ChannelRelease {
    /// Forced-floor gate: checked before the ordinary newer-version
    /// comparison and independent of any auto-update flag.
    pub fn check_forced_floor(&self, running: &ScriptVersion) -> Result<(), UpdateError> {
        if let Some(floor) = self.force_update_below_version {
            if *running < floor {
                return Err(UpdateError::ForcedUpdateRequired {
                    running: *running,
                    floor,
                });
            }
        }
        Ok(())
    }

    pub fn is_newer_than(&self, running: &ScriptVersion) -> bool {
        self.version.is_newer_than(running)
    }
}
