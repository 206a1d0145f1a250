//! Host facts consumed while normalizing interfaces.
//!
//! The normalizer never reads the host directly; it asks a [`FactProvider`].
//! [`SysfsFacts`] answers from `/sys/class/net`, [`StaticFacts`] from a
//! fixed table for tests and offline rendering.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::util::addr::MacAddr;

/// Default sysfs directory with one entry per network device.
pub const SYS_CLASS_NET: &str = "/sys/class/net";

/// Source of live host facts.
pub trait FactProvider {
    /// Get the current hardware address of a device, if it exists.
    fn mac_address(&self, device: &str) -> Option<MacAddr>;
}

impl<T: FactProvider + ?Sized> FactProvider for &T {
    fn mac_address(&self, device: &str) -> Option<MacAddr> {
        (**self).mac_address(device)
    }
}

impl<T: FactProvider + ?Sized> FactProvider for std::sync::Arc<T> {
    fn mac_address(&self, device: &str) -> Option<MacAddr> {
        (**self).mac_address(device)
    }
}

/// Facts read from sysfs.
#[derive(Debug, Clone)]
pub struct SysfsFacts {
    root: PathBuf,
}

impl SysfsFacts {
    /// Read from `/sys/class/net`.
    pub fn new() -> Self {
        Self::with_root(SYS_CLASS_NET)
    }

    /// Read from a different root, e.g. a fixture directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for SysfsFacts {
    fn default() -> Self {
        Self::new()
    }
}

impl FactProvider for SysfsFacts {
    fn mac_address(&self, device: &str) -> Option<MacAddr> {
        // Names are validated before lookup, but never walk out of root.
        if device.is_empty() || device.contains('/') || device == "." || device == ".." {
            return None;
        }

        let path = self.root.join(device).join("address");
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!(device, path = %path.display(), error = %e, "no MAC fact");
                return None;
            }
        };

        match content.trim().parse::<MacAddr>() {
            // Virtual devices without hardware report all zeros.
            Ok(mac) if mac.octets() == [0; 6] => None,
            Ok(mac) => Some(mac),
            Err(e) => {
                debug!(device, error = %e, "unparseable MAC fact");
                None
            }
        }
    }
}

/// Facts from a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticFacts {
    macs: HashMap<String, MacAddr>,
}

impl StaticFacts {
    /// Create an empty table; every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device's MAC address.
    pub fn with_mac(mut self, device: &str, mac: MacAddr) -> Self {
        self.macs.insert(device.to_string(), mac);
        self
    }
}

impl FactProvider for StaticFacts {
    fn mac_address(&self, device: &str) -> Option<MacAddr> {
        self.macs.get(device).copied()
    }
}
