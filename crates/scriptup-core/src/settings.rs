use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::UpdateError;

/// Explicit location of the managed script. Passed in by the caller; the
/// core never self-locates through ambient process state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLocation {
    path: PathBuf,
    file_name: String,
    directory: PathBuf,
}

impl ScriptLocation {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, UpdateError> {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                UpdateError::Config(format!(
                    "script path has no file name: {}",
                    path.display()
                ))
            })?;
        let directory = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            path,
            file_name,
            directory,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File name without its last extension; backup names build on this.
    pub fn file_stem(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.file_name,
        }
    }

    pub fn staging_path(&self) -> PathBuf {
        self.directory.join(format!("{}.staged", self.file_name))
    }
}

/// Durable updater configuration, loadable from a TOML file and overridable
/// by CLI flags. `check_interval_hours = 0` disables throttling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSettings {
    pub channel: String,
    pub metadata_url: String,
    pub release_root: String,
    #[serde(default = "default_check_interval_hours")]
    pub check_interval_hours: u64,
    #[serde(default)]
    pub auto_update: bool,
    #[serde(default)]
    pub restart_after_update: bool,
    #[serde(default)]
    pub show_dev_info: bool,
    #[serde(default)]
    pub trusted_root_keys: Vec<String>,
}

fn default_check_interval_hours() -> u64 {
    24
}

impl UpdateSettings {
    pub fn from_toml_str(input: &str) -> Result<Self, UpdateError> {
        let settings: Self = toml::from_str(input)
            .map_err(|err| UpdateError::Config(format!("invalid settings file: {err}")))?;
        if settings.channel.trim().is_empty() {
            return Err(UpdateError::Config(
                "settings channel must not be empty".to_string(),
            ));
        }
        Ok(settings)
    }
}
