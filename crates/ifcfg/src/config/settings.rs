//! Settings and manifest loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::NetworkConfig;
use crate::error::{Error, Result};
use crate::package::PackageManager;
use crate::runner::ActivationTool;

/// Directory holding ifcfg files on RHEL-family hosts.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/sysconfig/network-scripts";
/// Directory holding pending-activation markers.
pub const DEFAULT_STATE_DIR: &str = "/run/ifcfg";
/// Default timeout for every external command.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Where files go and how they are activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory the `ifcfg-<name>` files are written to.
    pub config_dir: PathBuf,
    /// Directory for pending-activation markers.
    pub state_dir: PathBuf,
    /// Tool used to reload and activate connections.
    pub tool: ActivationTool,
    /// Timeout for each external command, in seconds.
    pub command_timeout_secs: u64,
    /// Remove stale connections for an interface after activation.
    pub cleanup: bool,
    /// Reload the connection definition after writing.
    pub reload: bool,
    /// Sysfs directory MAC addresses are read from.
    pub sysfs_root: PathBuf,
    /// Installer for required packages.
    pub package_manager: PackageManager,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            tool: ActivationTool::default(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            cleanup: true,
            reload: true,
            sysfs_root: PathBuf::from(crate::facts::SYS_CLASS_NET),
            package_manager: PackageManager::default(),
        }
    }
}

impl Settings {
    /// Get the command timeout.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Path of the file managing `name`.
    pub fn ifcfg_path(&self, name: &str) -> PathBuf {
        self.config_dir.join(format!("ifcfg-{}", name))
    }

    /// Path of the pending-activation marker for `name`.
    pub fn pending_path(&self, name: &str) -> PathBuf {
        self.state_dir.join(format!("{}.pending", name))
    }
}

impl NetworkConfig {
    /// Parse a YAML manifest.
    ///
    /// # Example
    ///
    /// ```
    /// use ifcfg::config::NetworkConfig;
    ///
    /// let config = NetworkConfig::from_yaml_str(r#"
    /// interfaces:
    ///   - name: eth0
    ///     kind: static
    ///     ipaddress: [10.0.0.5, 10.0.0.6]
    ///     netmask: [255.255.255.0, 255.255.255.0]
    ///   - name: eth1
    ///     kind: dynamic
    /// "#).unwrap();
    /// assert_eq!(config.interfaces().len(), 2);
    /// ```
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Parse a JSON manifest.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load a manifest file. `.json` files are JSON, everything else YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Serialize as YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Serialize as pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
