//! Raw parameters to canonical [`InterfaceSpec`].

use std::net::IpAddr;

use tracing::{debug, warn};

use super::kinds::InterfaceKind;
use super::types::{
    DeclaredInterface, FlagValue, Flags, InterfaceParams, InterfaceSpec, Ipv4Binding, OneOrMany,
};
use crate::error::{Error, Result};
use crate::facts::FactProvider;
use crate::util::addr::{self, Ipv6Cidr, MacAddr};
use crate::util::ifname;

fn flag(value: &Option<FlagValue>) -> Option<bool> {
    value.as_ref().and_then(FlagValue::as_bool)
}

fn values(value: &Option<OneOrMany<String>>) -> &[String] {
    value.as_ref().map_or(&[][..], |v| v.as_slice())
}

// Validation has already rejected anything unparseable; these only map the
// error type so that a bypassed validator still fails loudly.
fn parse_all<T>(
    name: &str,
    field: &str,
    raw: &[String],
    parse: impl Fn(&str) -> addr::Result<T>,
) -> Result<Vec<T>> {
    raw.iter()
        .map(|s| parse(s).map_err(|e| Error::invalid(name, field, e.to_string())))
        .collect()
}

impl InterfaceSpec {
    /// Validate raw parameters and build the canonical record.
    ///
    /// Scalars and lists are normalized into ordered sequences, index 0 is
    /// the primary address. Defaults are applied to every unset flag. When
    /// no MAC is given and the kind carries hardware, the MAC of the base
    /// device (VLAN suffix stripped) is looked up through `facts`; a miss
    /// leaves it unset.
    ///
    /// Warnings are logged and do not fail.
    pub fn from_params(
        name: &str,
        kind: InterfaceKind,
        params: &InterfaceParams,
        facts: &impl FactProvider,
    ) -> Result<Self> {
        let validation = params.validate(name, kind);
        for w in &validation.warnings {
            warn!(interface = %name, field = %w.field, "{}", w.message);
        }
        validation.into_result(name)?;

        let device = params.device.clone().unwrap_or_else(|| name.to_string());
        let bootproto = kind.bootproto(params.bootproto);
        let keep_ipv4 = kind.accepts_ipv4() && !bootproto.is_dynamic();
        let keep_ipv6 = kind.accepts_ipv6();

        let ipv4 = if keep_ipv4 {
            let addresses = parse_all(name, "ipaddress", values(&params.ipaddress), addr::parse_ipv4)?;
            let netmasks = parse_all(name, "netmask", values(&params.netmask), addr::parse_netmask)?;
            addresses
                .into_iter()
                .zip(netmasks)
                .map(|(address, netmask)| Ipv4Binding { address, netmask })
                .collect()
        } else {
            Vec::new()
        };

        let gateway = match &params.gateway {
            Some(gw) if keep_ipv4 => Some(
                addr::parse_ipv4(gw).map_err(|e| Error::invalid(name, "gateway", e.to_string()))?,
            ),
            _ => None,
        };

        let ipv6: Vec<Ipv6Cidr> = if keep_ipv6 {
            parse_all(name, "ipv6address", values(&params.ipv6address), |s| s.parse())?
        } else {
            Vec::new()
        };

        let ipv6_gateway = match &params.ipv6gateway {
            Some(gw) if keep_ipv6 => Some(
                addr::parse_ipv6(gw)
                    .map_err(|e| Error::invalid(name, "ipv6gateway", e.to_string()))?,
            ),
            _ => None,
        };

        let flags = Flags {
            user_controlled: flag(&params.userctl).unwrap_or(false),
            manage_hwaddr: flag(&params.manage_hwaddr).unwrap_or(true),
            ipv6_init: flag(&params.ipv6init).unwrap_or(false) || !ipv6.is_empty(),
            ipv6_autoconf: flag(&params.ipv6autoconf),
            peer_dns: flag(&params.peerdns).unwrap_or(false),
            ipv6_peer_dns: flag(&params.ipv6peerdns),
            flush: flag(&params.flush).unwrap_or(false),
            def_route: flag(&params.defroute),
            nm_controlled: flag(&params.nm_controlled),
        };

        let mac_address = resolve_mac(name, kind, &device, params, flags.manage_hwaddr, facts)?;

        let dns = [&params.dns1, &params.dns2]
            .into_iter()
            .flatten()
            .map(|s| {
                addr::parse_addr(s).map_err(|e| Error::invalid(name, "dns", e.to_string()))
            })
            .collect::<Result<Vec<IpAddr>>>()?;

        let options = params
            .options
            .iter()
            .map(|(k, v)| (k.to_ascii_uppercase(), v.clone()))
            .collect();

        let spec = Self {
            name: name.to_string(),
            kind: kind.settings(&device, params),
            device,
            ensure: params.ensure.unwrap_or_default(),
            bootproto,
            ipv4,
            ipv6,
            gateway,
            ipv6_gateway,
            mac_address,
            flags,
            mtu: params.mtu,
            dns,
            domain: params.domain.clone(),
            zone: params.zone.clone(),
            scope: params.scope.clone(),
            metric: params.metric.clone(),
            link_delay: params.linkdelay.clone(),
            ethtool_opts: params.ethtool_opts.clone(),
            dhcp_hostname: params.dhcp_hostname.clone(),
            options,
        };

        debug!(
            interface = %spec.name,
            kind = %kind,
            ensure = spec.ensure.as_str(),
            addresses = spec.ipv4.len() + spec.ipv6.len(),
            "normalized interface"
        );
        Ok(spec)
    }

    /// Build the canonical record of a declared interface.
    pub fn from_declared(decl: &DeclaredInterface, facts: &impl FactProvider) -> Result<Self> {
        Self::from_params(decl.name(), decl.kind(), decl.params(), facts)
    }
}

fn resolve_mac(
    name: &str,
    kind: InterfaceKind,
    device: &str,
    params: &InterfaceParams,
    manage_hwaddr: bool,
    facts: &impl FactProvider,
) -> Result<Option<MacAddr>> {
    if !manage_hwaddr || kind == InterfaceKind::Alias {
        return Ok(None);
    }

    if let Some(explicit) = &params.macaddress {
        let mac = explicit
            .parse::<MacAddr>()
            .map_err(|e| Error::invalid(name, "macaddress", e.to_string()))?;
        return Ok(Some(mac));
    }

    if !kind.carries_hardware() {
        return Ok(None);
    }

    let base = ifname::base_device(device);
    let mac = facts.mac_address(base);
    if mac.is_none() {
        debug!(interface = %name, device = base, "MAC not resolvable, HWADDR omitted");
    }
    Ok(mac)
}
