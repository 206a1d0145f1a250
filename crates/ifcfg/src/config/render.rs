//! Canonical [`InterfaceSpec`] to ifcfg file body.

use std::fmt;

use super::types::{Ensure, InterfaceSpec, KindSettings};

/// First line of every file this crate writes.
pub const HEADER: &str = "# Managed by ifcfg";

/// Keys written from dedicated parameters, in canonical order. Extra
/// options may not use them.
pub const MANAGED_KEYS: &[&str] = &[
    "DEVICE",
    "BOOTPROTO",
    "IPADDR",
    "NETMASK",
    "GATEWAY",
    "IPV6INIT",
    "IPV6_AUTOCONF",
    "IPV6ADDR",
    "IPV6ADDR_SECONDARIES",
    "IPV6_DEFAULTGW",
    "IPV6_PEERDNS",
    "HWADDR",
    "ONBOOT",
    "ONPARENT",
    "USERCTL",
    "MTU",
    "PEERDNS",
    "DNS1",
    "DNS2",
    "DOMAIN",
    "DEFROUTE",
    "ETHTOOL_OPTS",
    "DHCP_HOSTNAME",
    "ZONE",
    "SCOPE",
    "METRIC",
    "LINKDELAY",
    "NM_CONTROLLED",
    "TYPE",
    "STP",
    "DELAY",
    "BRIDGING_OPTS",
    "BONDING_OPTS",
    "MASTER",
    "SLAVE",
    "BRIDGE",
    "VLAN",
];

/// Rendered file body: ordered `KEY=value` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    name: String,
    device: String,
    ensure: Ensure,
    lines: Vec<(String, String)>,
}

impl RenderedConfig {
    /// Get the interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the device the activation commands target.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Get the target state.
    pub fn ensure(&self) -> Ensure {
        self.ensure
    }

    /// Get the ordered `(KEY, value)` pairs, values unquoted.
    pub fn lines(&self) -> &[(String, String)] {
        &self.lines
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get the exact file content, header and trailing newline included.
    pub fn content(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RenderedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", HEADER)?;
        for (key, value) in &self.lines {
            writeln!(f, "{}={}", key, quote(value))?;
        }
        Ok(())
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

/// Quote a value for a shell-sourced `KEY=value` line.
///
/// Plain tokens are written bare. Anything else is double-quoted with
/// `\`, `"`, `$` and backtick escaped.
pub fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.:/@%+,".contains(c));
    if plain {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

struct Lines(Vec<(String, String)>);

impl Lines {
    fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.push((key.into(), value.to_string()));
    }

    fn push_opt(&mut self, key: &str, value: Option<impl ToString>) {
        if let Some(value) = value {
            self.push(key, value);
        }
    }
}

impl InterfaceSpec {
    /// Render the file body.
    ///
    /// Keys come out in one fixed order regardless of how the parameters
    /// were given, so identical specs always render byte-identical files.
    pub fn render(&self) -> RenderedConfig {
        let mut out = Lines(Vec::new());

        out.push("DEVICE", &self.device);
        out.push("BOOTPROTO", self.bootproto.as_str());

        for (i, binding) in self.ipv4.iter().enumerate() {
            out.push(suffixed("IPADDR", i), binding.address);
        }
        for (i, binding) in self.ipv4.iter().enumerate() {
            out.push(suffixed("NETMASK", i), binding.netmask);
        }
        out.push_opt("GATEWAY", self.gateway);

        out.push("IPV6INIT", yes_no(self.flags.ipv6_init));
        out.push_opt("IPV6_AUTOCONF", self.flags.ipv6_autoconf.map(yes_no));
        out.push_opt("IPV6ADDR", self.primary_ipv6());
        let secondaries = self.secondary_ipv6();
        if !secondaries.is_empty() {
            let joined = secondaries
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            out.push("IPV6ADDR_SECONDARIES", joined);
        }
        out.push_opt("IPV6_DEFAULTGW", self.ipv6_gateway);
        out.push_opt("IPV6_PEERDNS", self.flags.ipv6_peer_dns.map(yes_no));

        out.push_opt("HWADDR", self.mac_address);
        let onboot = if matches!(self.kind, KindSettings::Alias { .. }) {
            "ONPARENT"
        } else {
            "ONBOOT"
        };
        out.push(onboot, yes_no(self.ensure == Ensure::Up));
        out.push("USERCTL", yes_no(self.flags.user_controlled));
        out.push_opt("MTU", self.mtu);
        out.push("PEERDNS", yes_no(self.flags.peer_dns));
        for (i, server) in self.dns.iter().enumerate() {
            out.push(format!("DNS{}", i + 1), server);
        }
        out.push_opt("DOMAIN", self.domain.as_deref());
        out.push_opt("DEFROUTE", self.flags.def_route.map(yes_no));
        out.push_opt("ETHTOOL_OPTS", self.ethtool_opts.as_deref());
        out.push_opt("DHCP_HOSTNAME", self.dhcp_hostname.as_deref());
        out.push_opt("ZONE", self.zone.as_deref());
        out.push_opt("SCOPE", self.scope.as_deref());
        out.push_opt("METRIC", self.metric.as_deref());
        out.push_opt("LINKDELAY", self.link_delay.as_deref());
        out.push_opt("NM_CONTROLLED", self.flags.nm_controlled.map(yes_no));

        match &self.kind {
            KindSettings::Static | KindSettings::Dynamic | KindSettings::Alias { .. } => {}
            KindSettings::Bridge {
                stp,
                delay,
                bridging_opts,
            } => {
                out.push("TYPE", "Bridge");
                out.push_opt("STP", stp.map(yes_no));
                out.push_opt("DELAY", delay.as_deref());
                out.push_opt("BRIDGING_OPTS", bridging_opts.as_deref());
            }
            KindSettings::BridgePort { bridge } => out.push("BRIDGE", bridge),
            KindSettings::Bond { bonding_opts } => {
                out.push("TYPE", "Bond");
                out.push_opt("BONDING_OPTS", bonding_opts.as_deref());
            }
            KindSettings::BondSlave { master } => {
                out.push("MASTER", master);
                out.push("SLAVE", "yes");
            }
            KindSettings::Vlan { .. } => out.push("VLAN", "yes"),
        }

        // BTreeMap iteration is already sorted by key.
        for (key, value) in &self.options {
            out.push(key.as_str(), value);
        }

        RenderedConfig {
            name: self.name.clone(),
            device: self.device.clone(),
            ensure: self.ensure,
            lines: out.0,
        }
    }
}

fn suffixed(key: &str, index: usize) -> String {
    if index == 0 {
        key.to_string()
    } else {
        format!("{}{}", key, index)
    }
}
