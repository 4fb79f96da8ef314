//! YAML settings.
//!
//! ```yaml
//! host:
//!   retries: 3
//!   backoff_ms: 50
//!   call_timeout_ms: 30000   # 0 disables the deadline
//! output:
//!   update_file_name: updated_presentation.pptx
//!   merge_file_name: merged_presentation.pptx
//! work_dir: null
//! ```
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::CallPolicy;
use crate::error::{Error, Result};

/// Environment variable naming a settings file.
pub const CONFIG_ENV: &str = "SLIDESHIFT_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostSettings {
    /// Retries of a host call that reported itself busy.
    pub retries: u32,
    /// First retry delay in milliseconds, doubled per retry.
    pub backoff_ms: u64,
    /// Per-call deadline in milliseconds.
    pub call_timeout_ms: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_ms: 50,
            call_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    pub update_file_name: String,
    pub merge_file_name: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            update_file_name: "updated_presentation.pptx".to_string(),
            merge_file_name: "merged_presentation.pptx".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub host: HostSettings,
    pub output: OutputSettings,
    /// Parent directory for per-call working directories.
    pub work_dir: Option<PathBuf>,
}

impl Settings {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_saphyr::from_str(yaml).map_err(|e| Error::Config(format!("invalid settings: {}", e)))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loading settings");
        Self::from_yaml_str(&yaml)
    }

    /// Settings from the file named by `SLIDESHIFT_CONFIG`, or the defaults.
    pub fn from_env_or_default() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(PathBuf::from(path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn to_policy(&self) -> CallPolicy {
        CallPolicy {
            retries: self.host.retries,
            backoff: Duration::from_millis(self.host.backoff_ms),
            call_timeout: (self.host.call_timeout_ms > 0)
                .then(|| Duration::from_millis(self.host.call_timeout_ms)),
        }
    }
}
