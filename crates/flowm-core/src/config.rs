use crate::error::{FlowError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SpecsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecsConfig {
    /// Write `merge.diff` previews next to each delta on prepare.
    #[serde(default = "default_true")]
    pub write_diffs: bool,
    /// Unchanged lines shown around each diff hunk.
    #[serde(default = "default_diff_context")]
    pub diff_context: usize,
    /// Move the change into `changes/archive/` after a successful merge.
    #[serde(default = "default_true")]
    pub archive_on_merge: bool,
}

fn default_true() -> bool {
    true
}

fn default_diff_context() -> usize {
    3
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for SpecsConfig {
    fn default() -> Self {
        Self {
            write_diffs: default_true(),
            diff_context: default_diff_context(),
            archive_on_merge: default_true(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub specs: SpecsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            specs: SpecsConfig::default(),
        }
    }
}

impl Config {
    /// Load `.flow-maestro/config.yaml`. A workspace without the file gets
    /// the defaults; a directory that was never initialized is an error.
    pub fn load(root: &Path) -> Result<Self> {
        if !paths::flow_dir(root).is_dir() {
            return Err(FlowError::NotInitialized);
        }
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.version != CONFIG_VERSION {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "unsupported config version {} (expected {CONFIG_VERSION})",
                    self.version
                ),
            });
        }

        if self.specs.diff_context == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "specs.diff_context is 0: diff previews show changed lines only"
                    .to_string(),
            });
        } else if self.specs.diff_context > 20 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "specs.diff_context={} (>20 is unusual)",
                    self.specs.diff_context
                ),
            });
        }

        warnings
    }
}
