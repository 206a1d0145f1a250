//! Interface-kind presets.
//!
//! Each kind selects defaults and kind-specific keys, then goes through the
//! shared normalize/render/reconcile pipeline. There is no per-kind state
//! machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::{BootProto, InterfaceBuilder, InterfaceParams, KindSettings, NetworkConfig};
use crate::util::ifname;

/// Package providing `brctl`, needed before a bridge file is activated.
pub const BRIDGE_PACKAGE: &str = "bridge-utils";

/// Kind of a managed interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    /// Static IPv4/IPv6 addressing.
    Static,
    /// DHCP or BOOTP.
    Dynamic,
    /// Linux bridge.
    Bridge,
    /// Device enslaved to a bridge.
    BridgePort,
    /// Bonding master.
    Bond,
    /// Device enslaved to a bond.
    BondSlave,
    /// IP alias (`eth0:1`).
    Alias,
    /// 802.1Q VLAN (`eth0.100`).
    Vlan,
}

impl InterfaceKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Static,
        Self::Dynamic,
        Self::Bridge,
        Self::BridgePort,
        Self::Bond,
        Self::BondSlave,
        Self::Alias,
        Self::Vlan,
    ];

    /// Get the manifest name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::Bridge => "bridge",
            Self::BridgePort => "bridge_port",
            Self::Bond => "bond",
            Self::BondSlave => "bond_slave",
            Self::Alias => "alias",
            Self::Vlan => "vlan",
        }
    }

    /// Check if this kind is backed by hardware whose MAC can be pinned.
    pub fn carries_hardware(&self) -> bool {
        matches!(
            self,
            Self::Static | Self::Dynamic | Self::Vlan | Self::BridgePort | Self::BondSlave
        )
    }

    /// Check if this kind keeps static IPv4 fields.
    pub fn accepts_ipv4(&self) -> bool {
        !matches!(self, Self::Dynamic | Self::BridgePort | Self::BondSlave)
    }

    /// Check if this kind keeps IPv6 fields.
    pub fn accepts_ipv6(&self) -> bool {
        !matches!(self, Self::BridgePort | Self::BondSlave)
    }

    /// Check if this kind requires an address and netmask.
    pub fn requires_address(&self) -> bool {
        matches!(self, Self::Static)
    }

    /// Package that must be present before activation.
    pub fn required_package(&self) -> Option<&'static str> {
        match self {
            Self::Bridge => Some(BRIDGE_PACKAGE),
            _ => None,
        }
    }

    /// Position in the apply sequence. Masters come before their members,
    /// aliases come after everything they may sit on.
    pub(crate) fn apply_rank(&self) -> u8 {
        match self {
            Self::Bridge | Self::Bond => 0,
            Self::BridgePort | Self::BondSlave => 1,
            Self::Static | Self::Dynamic | Self::Vlan => 2,
            Self::Alias => 3,
        }
    }

    /// Resolve the boot protocol for this kind.
    pub(crate) fn bootproto(&self, requested: Option<BootProto>) -> BootProto {
        match self {
            Self::Dynamic => match requested {
                Some(BootProto::Bootp) => BootProto::Bootp,
                _ => BootProto::Dhcp,
            },
            Self::Bridge | Self::Bond | Self::Vlan => requested.unwrap_or(BootProto::None),
            Self::Static | Self::BridgePort | Self::BondSlave | Self::Alias => BootProto::None,
        }
    }

    /// Build kind-specific settings from validated parameters.
    pub(crate) fn settings(&self, device: &str, params: &InterfaceParams) -> KindSettings {
        match self {
            Self::Static => KindSettings::Static,
            Self::Dynamic => KindSettings::Dynamic,
            Self::Bridge => KindSettings::Bridge {
                stp: params.stp.as_ref().and_then(|f| f.as_bool()),
                delay: params.delay.clone(),
                bridging_opts: params.bridging_opts.clone(),
            },
            Self::BridgePort => KindSettings::BridgePort {
                bridge: params.bridge.clone().unwrap_or_default(),
            },
            Self::Bond => KindSettings::Bond {
                bonding_opts: params.bonding_opts.clone(),
            },
            Self::BondSlave => KindSettings::BondSlave {
                master: params.master.clone().unwrap_or_default(),
            },
            Self::Alias => KindSettings::Alias {
                parent: ifname::alias_parent(device)
                    .map(|(parent, _)| parent.to_string())
                    .unwrap_or_default(),
            },
            Self::Vlan => KindSettings::Vlan {
                parent: ifname::base_device(device).to_string(),
                id: ifname::vlan_id(device).unwrap_or_default(),
            },
        }
    }
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterfaceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .or(match normalized.as_str() {
                "dhcp" => Some(Self::Dynamic),
                _ => None,
            })
            .ok_or_else(|| format!("unknown interface kind: {}", s))
    }
}

impl NetworkConfig {
    /// Add an interface with static addressing.
    ///
    /// # Example
    ///
    /// ```
    /// use ifcfg::config::NetworkConfig;
    ///
    /// let config = NetworkConfig::new()
    ///     .static_interface("eth0", |i| {
    ///         i.ipaddress(["10.0.0.5", "10.0.0.6"])
    ///             .netmask(["255.255.255.0", "255.255.255.0"])
    ///             .gateway("10.0.0.1")
    ///     });
    /// assert_eq!(config.interfaces().len(), 1);
    /// ```
    pub fn static_interface(
        self,
        name: &str,
        f: impl FnOnce(InterfaceBuilder) -> InterfaceBuilder,
    ) -> Self {
        self.interface(name, InterfaceKind::Static, f)
    }

    /// Add an interface configured by DHCP (or BOOTP).
    pub fn dynamic_interface(
        self,
        name: &str,
        f: impl FnOnce(InterfaceBuilder) -> InterfaceBuilder,
    ) -> Self {
        self.interface(name, InterfaceKind::Dynamic, f)
    }

    /// Add a bridge.
    pub fn bridge(self, name: &str, f: impl FnOnce(InterfaceBuilder) -> InterfaceBuilder) -> Self {
        self.interface(name, InterfaceKind::Bridge, f)
    }

    /// Add a bridge port. Set the bridge with [`InterfaceBuilder::bridge`].
    pub fn bridge_port(
        self,
        name: &str,
        f: impl FnOnce(InterfaceBuilder) -> InterfaceBuilder,
    ) -> Self {
        self.interface(name, InterfaceKind::BridgePort, f)
    }

    /// Add a bonding master.
    pub fn bond(self, name: &str, f: impl FnOnce(InterfaceBuilder) -> InterfaceBuilder) -> Self {
        self.interface(name, InterfaceKind::Bond, f)
    }

    /// Add a bond slave. Set the master with [`InterfaceBuilder::master`].
    pub fn bond_slave(
        self,
        name: &str,
        f: impl FnOnce(InterfaceBuilder) -> InterfaceBuilder,
    ) -> Self {
        self.interface(name, InterfaceKind::BondSlave, f)
    }

    /// Add an IP alias. The name must be `<parent>:<label>`.
    pub fn alias(self, name: &str, f: impl FnOnce(InterfaceBuilder) -> InterfaceBuilder) -> Self {
        self.interface(name, InterfaceKind::Alias, f)
    }

    /// Add a VLAN. The name must be `<parent>.<id>`.
    pub fn vlan(self, name: &str, f: impl FnOnce(InterfaceBuilder) -> InterfaceBuilder) -> Self {
        self.interface(name, InterfaceKind::Vlan, f)
    }
}
