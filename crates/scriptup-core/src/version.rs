use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::UpdateError;

/// Four-component numeric version as used by the update metadata.
/// Missing trailing components compare as zero, so "1.2" == "1.2.0.0".
#[derive(Debug, Clone, Copy)]
pub struct ScriptVersion {
    components: [u64; 4],
    // Component count as written; display-only, never part of equality.
    rendered_len: usize,
}

impl PartialEq for ScriptVersion {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for ScriptVersion {}

impl std::hash::Hash for ScriptVersion {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

impl ScriptVersion {
    pub fn new(major: u64, minor: u64, patch: u64, build: u64) -> Self {
        Self {
            components: [major, minor, patch, build],
            rendered_len: 4,
        }
    }

    pub fn components(&self) -> [u64; 4] {
        self.components
    }

    /// Strictly-greater comparison: equal versions are never "newer".
    pub fn is_newer_than(&self, other: &ScriptVersion) -> bool {
        self > other
    }
}

impl PartialOrd for ScriptVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScriptVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl FromStr for ScriptVersion {
    type Err = UpdateError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(UpdateError::Metadata("empty version string".to_string()));
        }

        let mut components = [0u64; 4];
        let mut count = 0usize;
        for part in trimmed.split('.') {
            if count == 4 {
                return Err(UpdateError::Metadata(format!(
                    "version '{trimmed}' has more than four components"
                )));
            }
            components[count] = part.parse::<u64>().map_err(|_| {
                UpdateError::Metadata(format!(
                    "invalid version component '{part}' in '{trimmed}'"
                ))
            })?;
            count += 1;
        }

        Ok(Self {
            components,
            rendered_len: count,
        })
    }
}

impl fmt::Display for ScriptVersion {
    // Renders exactly the components that were parsed: release tags and
    // backup names derived from a metadata version must reproduce the
    // remote spelling byte for byte.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.components[..self.rendered_len]
            .iter()
            .map(|component| component.to_string())
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&rendered)
    }
}

impl Serialize for ScriptVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ScriptVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
