//! Global configuration model for isoshelf.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IsoshelfError, Result};

/// Root configuration. Every field has a default so a config file only
/// needs to list what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsoshelfConfig {
    /// Path of the JSON catalog document.
    pub catalog_file: PathBuf,
    /// Path of the host storage registry (`storage.cfg`).
    pub storage_cfg: PathBuf,
    /// Parent of default mount bases.
    pub mount_root: PathBuf,
    /// Extra NFS mount options appended after `ro`, comma-separated.
    pub nfs_options: String,
    /// Pause after ejecting media before re-checking VMs, in seconds.
    pub eject_settle_secs: u64,
}

impl Default for IsoshelfConfig {
    fn default() -> Self {
        Self {
            catalog_file: crate::constants::default_catalog_file(),
            storage_cfg: PathBuf::from(crate::constants::DEFAULT_STORAGE_CFG),
            mount_root: PathBuf::from(crate::constants::DEFAULT_MOUNT_ROOT),
            nfs_options: crate::constants::DEFAULT_NFS_OPTIONS.to_string(),
            eject_settle_secs: crate::constants::DEFAULT_EJECT_SETTLE_SECS,
        }
    }
}

impl IsoshelfConfig {
    /// Loads a configuration file, filling absent fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails [`IsoshelfConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading configuration");
        let content =
            std::fs::read_to_string(path).map_err(|e| IsoshelfError::io(path, e))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that paths are absolute where the host requires it.
    ///
    /// # Errors
    ///
    /// Returns [`IsoshelfError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !self.mount_root.is_absolute() {
            return Err(IsoshelfError::Config {
                message: format!(
                    "mount_root must be an absolute path, got {}",
                    self.mount_root.display()
                ),
            });
        }
        if self.nfs_options.split(',').any(|opt| opt.trim() == "rw") {
            return Err(IsoshelfError::Config {
                message: "nfs_options must not request a read-write mount".into(),
            });
        }
        Ok(())
    }

    /// Returns the remediation settle delay.
    #[must_use]
    pub const fn eject_settle(&self) -> Duration {
        Duration::from_secs(self.eject_settle_secs)
    }
}
