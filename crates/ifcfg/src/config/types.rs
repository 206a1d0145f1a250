//! Core types for declarative interface configuration.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use super::kinds::InterfaceKind;
use super::settings::Settings;
use crate::util::addr::{Ipv6Cidr, MacAddr};

/// Declarative interface configuration.
///
/// Holds the desired state of every managed interface. Use the per-kind
/// builder methods ([`static_interface`](NetworkConfig::static_interface),
/// [`bridge`](NetworkConfig::bridge), ...) or load a manifest with
/// [`from_yaml_str`](NetworkConfig::from_yaml_str), then call
/// [`diff()`](NetworkConfig::diff) or [`apply()`](NetworkConfig::apply).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub(crate) settings: Settings,
    #[serde(default)]
    pub(crate) interfaces: Vec<DeclaredInterface>,
}

impl NetworkConfig {
    /// Create an empty configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the settings.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Add an interface of the given kind.
    pub fn interface(
        mut self,
        name: &str,
        kind: InterfaceKind,
        f: impl FnOnce(InterfaceBuilder) -> InterfaceBuilder,
    ) -> Self {
        let builder = f(InterfaceBuilder::new(name, kind));
        self.interfaces.push(builder.build());
        self
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get mutable settings, used by the CLI to apply flag overrides.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Get the declared interfaces.
    pub fn interfaces(&self) -> &[DeclaredInterface] {
        &self.interfaces
    }

    /// Find a declared interface by name.
    pub fn get(&self, name: &str) -> Option<&DeclaredInterface> {
        self.interfaces.iter().find(|i| i.name == name)
    }
}

// ============================================================================
// Raw parameters
// ============================================================================

/// Target state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    /// Interface is started at boot and brought up on apply.
    #[default]
    Up,
    /// Interface is not started at boot and brought down on apply.
    Down,
}

impl Ensure {
    /// Get the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Address assignment protocol (`BOOTPROTO`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootProto {
    /// Static addressing.
    #[default]
    None,
    /// DHCP.
    Dhcp,
    /// BOOTP.
    Bootp,
}

impl BootProto {
    /// Get the token written to the file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Dhcp => "dhcp",
            Self::Bootp => "bootp",
        }
    }

    /// Check if addresses come from a server.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dhcp | Self::Bootp)
    }
}

/// A parameter that may be given as a single value or an ordered list.
///
/// `One(x)` is equivalent to `Many(vec![x])`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Normalize into an ordered list.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(v) => v,
        }
    }

    /// Borrow as a slice.
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(v) => std::slice::from_ref(v),
            Self::Many(v) => v,
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Check if no values are present.
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(s: &str) -> Self {
        Self::One(s.to_string())
    }
}

impl From<String> for OneOrMany<String> {
    fn from(s: String) -> Self {
        Self::One(s)
    }
}

impl From<Vec<&str>> for OneOrMany<String> {
    fn from(v: Vec<&str>) -> Self {
        Self::Many(v.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for OneOrMany<String> {
    fn from(v: Vec<String>) -> Self {
        Self::Many(v)
    }
}

impl<const N: usize> From<[&str; N]> for OneOrMany<String> {
    fn from(v: [&str; N]) -> Self {
        Self::Many(v.iter().map(|s| s.to_string()).collect())
    }
}

/// A boolean flag as written by the caller.
///
/// Kept loose so that `peerdns: maybe` reaches the validator as a
/// violation instead of failing manifest deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Text(String),
}

impl FlagValue {
    /// Interpret the flag. `true`/`false` and the ifcfg tokens
    /// `yes`/`no` are accepted, any case.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
        }
    }
}

impl From<bool> for FlagValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Caller-supplied parameters of one interface, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensure: Option<Ensure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootproto: Option<BootProto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipaddress: Option<OneOrMany<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netmask: Option<OneOrMany<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6address: Option<OneOrMany<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macaddress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub userctl: Option<FlagValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manage_hwaddr: Option<FlagValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6init: Option<FlagValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6autoconf: Option<FlagValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peerdns: Option<FlagValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6peerdns: Option<FlagValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flush: Option<FlagValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defroute: Option<FlagValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nm_controlled: Option<FlagValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkdelay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethtool_opts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_hostname: Option<String>,

    // Bridge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stp: Option<FlagValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridging_opts: Option<String>,
    // Bridge port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
    // Bond
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonding_opts: Option<String>,
    // Bond slave
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,

    /// Extra `KEY=value` lines written verbatim after the managed keys.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,

    /// Keys the manifest carried that no parameter claims.
    #[serde(flatten)]
    pub unknown: BTreeMap<String, serde_yaml::Value>,
}

/// One interface as declared by the caller: name, kind and raw parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredInterface {
    pub(crate) name: String,
    pub(crate) kind: InterfaceKind,
    #[serde(flatten)]
    pub(crate) params: InterfaceParams,
}

impl DeclaredInterface {
    /// Create a declaration from raw parameters.
    pub fn new(name: impl Into<String>, kind: InterfaceKind, params: InterfaceParams) -> Self {
        Self {
            name: name.into(),
            kind,
            params,
        }
    }

    /// Get the interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the interface kind.
    pub fn kind(&self) -> InterfaceKind {
        self.kind
    }

    /// Get the raw parameters.
    pub fn params(&self) -> &InterfaceParams {
        &self.params
    }

    /// Get the target state, defaulting to up.
    pub fn ensure(&self) -> Ensure {
        self.params.ensure.unwrap_or_default()
    }

    /// Get the device name, defaulting to the interface name.
    pub fn device(&self) -> &str {
        self.params.device.as_deref().unwrap_or(&self.name)
    }
}

/// Builder for interface parameters.
#[derive(Debug)]
pub struct InterfaceBuilder {
    name: String,
    kind: InterfaceKind,
    params: InterfaceParams,
}

impl InterfaceBuilder {
    pub(crate) fn new(name: &str, kind: InterfaceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            params: InterfaceParams::default(),
        }
    }

    /// Bring the interface up (the default).
    pub fn up(mut self) -> Self {
        self.params.ensure = Some(Ensure::Up);
        self
    }

    /// Bring the interface down and disable it at boot.
    pub fn down(mut self) -> Self {
        self.params.ensure = Some(Ensure::Down);
        self
    }

    /// Set the device name when it differs from the interface name.
    pub fn device(mut self, device: &str) -> Self {
        self.params.device = Some(device.to_string());
        self
    }

    /// Set the boot protocol.
    pub fn bootproto(mut self, proto: BootProto) -> Self {
        self.params.bootproto = Some(proto);
        self
    }

    /// Set the IPv4 address(es). The first one is the primary.
    pub fn ipaddress(mut self, addrs: impl Into<OneOrMany<String>>) -> Self {
        self.params.ipaddress = Some(addrs.into());
        self
    }

    /// Set the IPv4 netmask(s), one per address.
    pub fn netmask(mut self, masks: impl Into<OneOrMany<String>>) -> Self {
        self.params.netmask = Some(masks.into());
        self
    }

    /// Append one address/netmask pair.
    pub fn address(mut self, addr: &str, mask: &str) -> Self {
        push(&mut self.params.ipaddress, addr);
        push(&mut self.params.netmask, mask);
        self
    }

    /// Set the IPv4 default gateway.
    pub fn gateway(mut self, gw: &str) -> Self {
        self.params.gateway = Some(gw.to_string());
        self
    }

    /// Set the IPv6 address(es). The first one is the primary.
    pub fn ipv6address(mut self, addrs: impl Into<OneOrMany<String>>) -> Self {
        self.params.ipv6address = Some(addrs.into());
        self
    }

    /// Set the IPv6 default gateway.
    pub fn ipv6gateway(mut self, gw: &str) -> Self {
        self.params.ipv6gateway = Some(gw.to_string());
        self
    }

    /// Set the hardware address explicitly.
    pub fn macaddress(mut self, mac: &str) -> Self {
        self.params.macaddress = Some(mac.to_string());
        self
    }

    /// Set the MTU.
    pub fn mtu(mut self, mtu: u32) -> Self {
        self.params.mtu = Some(mtu);
        self
    }

    /// Set the nameservers (at most two are meaningful).
    pub fn dns(mut self, primary: &str, secondary: Option<&str>) -> Self {
        self.params.dns1 = Some(primary.to_string());
        self.params.dns2 = secondary.map(String::from);
        self
    }

    /// Set the search domain.
    pub fn domain(mut self, domain: &str) -> Self {
        self.params.domain = Some(domain.to_string());
        self
    }

    /// Allow non-root users to control the interface.
    pub fn userctl(mut self, on: bool) -> Self {
        self.params.userctl = Some(on.into());
        self
    }

    /// Write HWADDR (explicit or looked up from the host).
    pub fn manage_hwaddr(mut self, on: bool) -> Self {
        self.params.manage_hwaddr = Some(on.into());
        self
    }

    /// Enable IPv6.
    pub fn ipv6init(mut self, on: bool) -> Self {
        self.params.ipv6init = Some(on.into());
        self
    }

    /// Enable IPv6 autoconfiguration.
    pub fn ipv6autoconf(mut self, on: bool) -> Self {
        self.params.ipv6autoconf = Some(on.into());
        self
    }

    /// Accept DNS servers from DHCP.
    pub fn peerdns(mut self, on: bool) -> Self {
        self.params.peerdns = Some(on.into());
        self
    }

    /// Accept IPv6 DNS servers from the network.
    pub fn ipv6peerdns(mut self, on: bool) -> Self {
        self.params.ipv6peerdns = Some(on.into());
        self
    }

    /// Flush addresses from the device before bringing it up.
    pub fn flush(mut self, on: bool) -> Self {
        self.params.flush = Some(on.into());
        self
    }

    /// Install the default route through this interface.
    pub fn defroute(mut self, on: bool) -> Self {
        self.params.defroute = Some(on.into());
        self
    }

    /// Set NM_CONTROLLED.
    pub fn nm_controlled(mut self, on: bool) -> Self {
        self.params.nm_controlled = Some(on.into());
        self
    }

    /// Set the firewall zone.
    pub fn zone(mut self, zone: &str) -> Self {
        self.params.zone = Some(zone.to_string());
        self
    }

    /// Set the address scope.
    pub fn scope(mut self, scope: &str) -> Self {
        self.params.scope = Some(scope.to_string());
        self
    }

    /// Set the route metric.
    pub fn metric(mut self, metric: &str) -> Self {
        self.params.metric = Some(metric.to_string());
        self
    }

    /// Set the link delay in seconds.
    pub fn linkdelay(mut self, delay: &str) -> Self {
        self.params.linkdelay = Some(delay.to_string());
        self
    }

    /// Set ethtool options.
    pub fn ethtool_opts(mut self, opts: &str) -> Self {
        self.params.ethtool_opts = Some(opts.to_string());
        self
    }

    /// Set the hostname sent with DHCP requests.
    pub fn dhcp_hostname(mut self, hostname: &str) -> Self {
        self.params.dhcp_hostname = Some(hostname.to_string());
        self
    }

    /// Enable spanning tree on a bridge.
    pub fn stp(mut self, on: bool) -> Self {
        self.params.stp = Some(on.into());
        self
    }

    /// Set the bridge forwarding delay.
    pub fn delay(mut self, delay: &str) -> Self {
        self.params.delay = Some(delay.to_string());
        self
    }

    /// Set extra bridge options.
    pub fn bridging_opts(mut self, opts: &str) -> Self {
        self.params.bridging_opts = Some(opts.to_string());
        self
    }

    /// Set the bridge a port belongs to.
    pub fn bridge(mut self, bridge: &str) -> Self {
        self.params.bridge = Some(bridge.to_string());
        self
    }

    /// Set bonding driver options.
    pub fn bonding_opts(mut self, opts: &str) -> Self {
        self.params.bonding_opts = Some(opts.to_string());
        self
    }

    /// Set the bond a slave belongs to.
    pub fn master(mut self, master: &str) -> Self {
        self.params.master = Some(master.to_string());
        self
    }

    /// Add an extra `KEY=value` line.
    pub fn option(mut self, key: &str, value: &str) -> Self {
        self.params.options.insert(key.to_string(), value.to_string());
        self
    }

    /// Replace all parameters at once.
    pub fn params(mut self, params: InterfaceParams) -> Self {
        self.params = params;
        self
    }

    pub(crate) fn build(self) -> DeclaredInterface {
        DeclaredInterface {
            name: self.name,
            kind: self.kind,
            params: self.params,
        }
    }
}

fn push(slot: &mut Option<OneOrMany<String>>, value: &str) {
    let mut values = slot.take().map(OneOrMany::into_vec).unwrap_or_default();
    values.push(value.to_string());
    *slot = Some(OneOrMany::Many(values));
}

// ============================================================================
// Canonical record
// ============================================================================

/// An IPv4 address with its netmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Binding {
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl std::fmt::Display for Ipv4Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.netmask)
    }
}

/// Boolean settings after defaults have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub user_controlled: bool,
    pub manage_hwaddr: bool,
    pub ipv6_init: bool,
    pub ipv6_autoconf: Option<bool>,
    pub peer_dns: bool,
    pub ipv6_peer_dns: Option<bool>,
    pub flush: bool,
    pub def_route: Option<bool>,
    pub nm_controlled: Option<bool>,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            user_controlled: false,
            manage_hwaddr: true,
            ipv6_init: false,
            ipv6_autoconf: None,
            peer_dns: false,
            ipv6_peer_dns: None,
            flush: false,
            def_route: None,
            nm_controlled: None,
        }
    }
}

/// Kind-specific settings after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindSettings {
    Static,
    Dynamic,
    Bridge {
        stp: Option<bool>,
        delay: Option<String>,
        bridging_opts: Option<String>,
    },
    BridgePort {
        bridge: String,
    },
    Bond {
        bonding_opts: Option<String>,
    },
    BondSlave {
        master: String,
    },
    Alias {
        parent: String,
    },
    Vlan {
        parent: String,
        id: u16,
    },
}

impl KindSettings {
    /// Get the kind this setting belongs to.
    pub fn kind(&self) -> InterfaceKind {
        match self {
            Self::Static => InterfaceKind::Static,
            Self::Dynamic => InterfaceKind::Dynamic,
            Self::Bridge { .. } => InterfaceKind::Bridge,
            Self::BridgePort { .. } => InterfaceKind::BridgePort,
            Self::Bond { .. } => InterfaceKind::Bond,
            Self::BondSlave { .. } => InterfaceKind::BondSlave,
            Self::Alias { .. } => InterfaceKind::Alias,
            Self::Vlan { .. } => InterfaceKind::Vlan,
        }
    }
}

/// Canonical desired state of one interface.
///
/// Built fresh from [`DeclaredInterface`] on every pass by
/// [`InterfaceSpec::from_declared`]; the same input and host facts always
/// produce the same record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSpec {
    pub(crate) name: String,
    pub(crate) device: String,
    pub(crate) kind: KindSettings,
    pub(crate) ensure: Ensure,
    pub(crate) bootproto: BootProto,
    pub(crate) ipv4: Vec<Ipv4Binding>,
    pub(crate) ipv6: Vec<Ipv6Cidr>,
    pub(crate) gateway: Option<Ipv4Addr>,
    pub(crate) ipv6_gateway: Option<Ipv6Addr>,
    pub(crate) mac_address: Option<MacAddr>,
    pub(crate) flags: Flags,
    pub(crate) mtu: Option<u32>,
    pub(crate) dns: Vec<IpAddr>,
    pub(crate) domain: Option<String>,
    pub(crate) zone: Option<String>,
    pub(crate) scope: Option<String>,
    pub(crate) metric: Option<String>,
    pub(crate) link_delay: Option<String>,
    pub(crate) ethtool_opts: Option<String>,
    pub(crate) dhcp_hostname: Option<String>,
    pub(crate) options: BTreeMap<String, String>,
}

impl InterfaceSpec {
    /// Get the interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the device name.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Get the kind-specific settings.
    pub fn kind(&self) -> &KindSettings {
        &self.kind
    }

    /// Get the target state.
    pub fn ensure(&self) -> Ensure {
        self.ensure
    }

    /// Get the boot protocol.
    pub fn bootproto(&self) -> BootProto {
        self.bootproto
    }

    /// Get the primary IPv4 binding.
    pub fn primary_ipv4(&self) -> Option<&Ipv4Binding> {
        self.ipv4.first()
    }

    /// Get the secondary IPv4 bindings, in declaration order.
    pub fn secondary_ipv4(&self) -> &[Ipv4Binding] {
        self.ipv4.get(1..).unwrap_or(&[])
    }

    /// Get the primary IPv6 address.
    pub fn primary_ipv6(&self) -> Option<&Ipv6Cidr> {
        self.ipv6.first()
    }

    /// Get the secondary IPv6 addresses, in declaration order.
    pub fn secondary_ipv6(&self) -> &[Ipv6Cidr] {
        self.ipv6.get(1..).unwrap_or(&[])
    }

    /// Get the IPv4 gateway.
    pub fn gateway(&self) -> Option<Ipv4Addr> {
        self.gateway
    }

    /// Get the IPv6 gateway.
    pub fn ipv6_gateway(&self) -> Option<Ipv6Addr> {
        self.ipv6_gateway
    }

    /// Get the resolved hardware address.
    pub fn mac_address(&self) -> Option<MacAddr> {
        self.mac_address
    }

    /// Get the flags.
    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    /// Get the MTU.
    pub fn mtu(&self) -> Option<u32> {
        self.mtu
    }

    /// Get the nameservers (0-2).
    pub fn dns(&self) -> &[IpAddr] {
        &self.dns
    }

    /// Get the search domain.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }
}
