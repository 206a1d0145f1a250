//! Turn existing ifcfg files back into declarations.
//!
//! Used to bootstrap a manifest from a host that is configured by hand.
//! Keys with a parameter counterpart are mapped back; everything else is
//! carried in `options` so rendering the result reproduces the file.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use super::kinds::InterfaceKind;
use super::parse::IfcfgFile;
use super::types::{
    BootProto, DeclaredInterface, Ensure, FlagValue, InterfaceParams, NetworkConfig, OneOrMany,
};
use crate::error::{Error, Result};
use crate::util::addr::prefix_to_netmask;
use crate::util::ifname;

/// Keys consumed by kind inference or derived from other keys.
const STRUCTURAL_KEYS: &[&str] = &["TYPE", "SLAVE", "VLAN", "BONDING_MASTER"];

/// Infer the interface kind of a file.
///
/// `TYPE` wins, then port/slave linkage, then the name shape, then
/// `BOOTPROTO`.
pub fn infer_kind(name: &str, file: &IfcfgFile) -> InterfaceKind {
    let kind_type = file.get("TYPE").map(str::to_ascii_lowercase);
    match kind_type.as_deref() {
        Some("bridge") => return InterfaceKind::Bridge,
        Some("bond") => return InterfaceKind::Bond,
        _ => {}
    }
    if file.get("BONDING_MASTER").map(is_yes) == Some(true) {
        return InterfaceKind::Bond;
    }
    if file.get("BRIDGE").is_some() {
        return InterfaceKind::BridgePort;
    }
    if file.get("MASTER").is_some() {
        return InterfaceKind::BondSlave;
    }
    if ifname::alias_parent(name).is_some() {
        return InterfaceKind::Alias;
    }
    let device = file.get("DEVICE").unwrap_or(name);
    if file.get("VLAN").map(is_yes) == Some(true) || ifname::vlan_id(device).is_some() {
        return InterfaceKind::Vlan;
    }
    match file.get("BOOTPROTO").map(str::to_ascii_lowercase).as_deref() {
        Some("dhcp") | Some("bootp") => InterfaceKind::Dynamic,
        _ => InterfaceKind::Static,
    }
}

/// Map one parsed file back to a declared interface.
pub fn declared_from_ifcfg(name: &str, file: &IfcfgFile) -> DeclaredInterface {
    let kind = infer_kind(name, file);
    let mut params = InterfaceParams::default();

    let mut addresses = BTreeMap::new();
    let mut netmasks = BTreeMap::new();
    let mut prefixes = BTreeMap::new();

    for (key, value) in file.to_map() {
        if let Some(idx) = suffix_index(&key, "IPADDR") {
            addresses.insert(idx, value);
            continue;
        }
        if let Some(idx) = suffix_index(&key, "NETMASK") {
            netmasks.insert(idx, value);
            continue;
        }
        if let Some(idx) = suffix_index(&key, "PREFIX") {
            prefixes.insert(idx, value);
            continue;
        }
        if STRUCTURAL_KEYS.contains(&key.as_str()) {
            continue;
        }

        match key.as_str() {
            "DEVICE" => {
                if value != name {
                    params.device = Some(value);
                }
            }
            "BOOTPROTO" => {
                params.bootproto = match value.to_ascii_lowercase().as_str() {
                    "dhcp" => Some(BootProto::Dhcp),
                    "bootp" => Some(BootProto::Bootp),
                    _ => None,
                }
            }
            "ONBOOT" | "ONPARENT" => {
                params.ensure = Some(if is_yes(&value) { Ensure::Up } else { Ensure::Down })
            }
            "GATEWAY" => params.gateway = Some(value),
            "IPV6ADDR" => push(&mut params.ipv6address, value),
            "IPV6ADDR_SECONDARIES" => {
                for addr in value.split_whitespace() {
                    push(&mut params.ipv6address, addr.to_string());
                }
            }
            "IPV6_DEFAULTGW" => params.ipv6gateway = Some(value),
            "HWADDR" => params.macaddress = Some(value),
            "MTU" => match value.parse() {
                Ok(mtu) => params.mtu = Some(mtu),
                Err(_) => {
                    params.options.insert(key, value);
                }
            },
            "DNS1" => params.dns1 = Some(value),
            "DNS2" => params.dns2 = Some(value),
            "DOMAIN" => params.domain = Some(value),
            "USERCTL" => params.userctl = Some(flag(value)),
            "IPV6INIT" => params.ipv6init = Some(flag(value)),
            "IPV6_AUTOCONF" => params.ipv6autoconf = Some(flag(value)),
            "PEERDNS" => params.peerdns = Some(flag(value)),
            "IPV6_PEERDNS" => params.ipv6peerdns = Some(flag(value)),
            "DEFROUTE" => params.defroute = Some(flag(value)),
            "NM_CONTROLLED" => params.nm_controlled = Some(flag(value)),
            "STP" => params.stp = Some(flag(value)),
            "ZONE" => params.zone = Some(value),
            "SCOPE" => params.scope = Some(value),
            "METRIC" => params.metric = Some(value),
            "LINKDELAY" => params.linkdelay = Some(value),
            "ETHTOOL_OPTS" => params.ethtool_opts = Some(value),
            "DHCP_HOSTNAME" => params.dhcp_hostname = Some(value),
            "DELAY" => params.delay = Some(value),
            "BRIDGING_OPTS" => params.bridging_opts = Some(value),
            "BRIDGE" => params.bridge = Some(value),
            "BONDING_OPTS" => params.bonding_opts = Some(value),
            "MASTER" => params.master = Some(value),
            _ => {
                params.options.insert(key, value);
            }
        }
    }

    // Keep address and netmask lists paired by suffix.
    for (idx, address) in addresses {
        let mask = netmasks.remove(&idx).or_else(|| {
            prefixes
                .remove(&idx)
                .and_then(|p| p.parse::<u8>().ok())
                .and_then(|p| prefix_to_netmask(p).ok())
                .map(|m| m.to_string())
        });
        push(&mut params.ipaddress, address);
        if let Some(mask) = mask {
            push(&mut params.netmask, mask);
        }
    }

    // Dynamic and port kinds drop addresses anyway.
    if !kind.accepts_ipv4() {
        params.ipaddress = None;
        params.netmask = None;
    }

    DeclaredInterface::new(name, kind, params)
}

/// Read every `ifcfg-*` file in `dir` into a configuration.
///
/// `lo` and editor/package backup files are skipped. When `only` is not
/// empty, just those interface names are read.
pub fn capture_dir(dir: &Path, only: &[String]) -> Result<NetworkConfig> {
    let mut names = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| Error::file(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::file(dir, e))?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Some(name) = file_name.strip_prefix("ifcfg-") else {
            continue;
        };
        if name == "lo" || is_backup(name) {
            debug!(file = %file_name, "skipping");
            continue;
        }
        if !only.is_empty() && !only.iter().any(|o| o == name) {
            continue;
        }
        names.push(name.to_string());
    }
    names.sort();

    let mut config = NetworkConfig::new();
    config.settings.config_dir = dir.to_path_buf();
    for name in names {
        let path = dir.join(format!("ifcfg-{}", name));
        match IfcfgFile::read(&path) {
            Ok(file) => config.interfaces.push(declared_from_ifcfg(&name, &file)),
            Err(e) if !only.is_empty() => return Err(e),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
        }
    }
    Ok(config)
}

fn is_backup(name: &str) -> bool {
    name.ends_with('~')
        || [".bak", ".orig", ".rpmnew", ".rpmsave", ".old"]
            .iter()
            .any(|ext| name.ends_with(ext))
}

/// `IPADDR` is index 0, `IPADDR3` index 3.
fn suffix_index(key: &str, base: &str) -> Option<u32> {
    let rest = key.strip_prefix(base)?;
    if rest.is_empty() {
        return Some(0);
    }
    if rest.bytes().all(|b| b.is_ascii_digit()) {
        rest.parse().ok()
    } else {
        None
    }
}

fn is_yes(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "yes" | "true" | "1")
}

fn flag(value: String) -> FlagValue {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" => FlagValue::Bool(true),
        "no" | "false" => FlagValue::Bool(false),
        _ => FlagValue::Text(value),
    }
}

fn push(list: &mut Option<OneOrMany<String>>, value: String) {
    *list = Some(match list.take() {
        None => OneOrMany::One(value),
        Some(existing) => {
            let mut values = existing.into_vec();
            values.push(value);
            OneOrMany::Many(values)
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterfaceSpec;
    use crate::facts::StaticFacts;

    fn parse(content: &str) -> IfcfgFile {
        IfcfgFile::parse(content).unwrap()
    }

    #[test]
    fn test_infer_kind() {
        assert_eq!(infer_kind("br0", &parse("TYPE=Bridge\n")), InterfaceKind::Bridge);
        assert_eq!(infer_kind("bond0", &parse("TYPE=Bond\n")), InterfaceKind::Bond);
        assert_eq!(
            infer_kind("bond0", &parse("BONDING_MASTER=yes\n")),
            InterfaceKind::Bond
        );
        assert_eq!(infer_kind("eth1", &parse("BRIDGE=br0\n")), InterfaceKind::BridgePort);
        assert_eq!(
            infer_kind("eth2", &parse("MASTER=bond0\nSLAVE=yes\n")),
            InterfaceKind::BondSlave
        );
        assert_eq!(infer_kind("eth0:1", &parse("IPADDR=10.0.0.9\n")), InterfaceKind::Alias);
        assert_eq!(infer_kind("eth0.100", &parse("VLAN=yes\n")), InterfaceKind::Vlan);
        assert_eq!(infer_kind("eth0", &parse("BOOTPROTO=dhcp\n")), InterfaceKind::Dynamic);
        assert_eq!(infer_kind("eth0", &parse("BOOTPROTO=none\n")), InterfaceKind::Static);
    }

    #[test]
    fn test_static_with_secondaries() {
        let file = parse(
            "DEVICE=eth0\nBOOTPROTO=none\nIPADDR=10.0.0.5\nPREFIX=24\n\
             IPADDR1=10.0.0.6\nNETMASK1=255.255.255.0\nONBOOT=yes\nUSERCTL=no\n",
        );
        let decl = declared_from_ifcfg("eth0", &file);
        assert_eq!(decl.kind(), InterfaceKind::Static);

        let params = decl.params();
        assert_eq!(params.device, None);
        assert_eq!(
            params.ipaddress.as_ref().unwrap().as_slice(),
            &["10.0.0.5".to_string(), "10.0.0.6".to_string()]
        );
        assert_eq!(
            params.netmask.as_ref().unwrap().as_slice(),
            &["255.255.255.0".to_string(), "255.255.255.0".to_string()]
        );
        assert_eq!(params.ensure, Some(Ensure::Up));
        assert_eq!(params.userctl, Some(FlagValue::Bool(false)));
    }

    #[test]
    fn test_unknown_keys_become_options() {
        let file = parse(
            "BOOTPROTO=dhcp\nUUID=5fb06bd0-0bb0-7ffb-45f1-d6edd65f3e03\nNAME=\"System eth0\"\n",
        );
        let decl = declared_from_ifcfg("eth0", &file);
        assert_eq!(decl.kind(), InterfaceKind::Dynamic);
        assert_eq!(decl.params().options.get("NAME").map(String::as_str), Some("System eth0"));
        assert!(decl.params().options.contains_key("UUID"));
    }

    #[test]
    fn test_bridge_port_drops_addresses() {
        let file = parse("DEVICE=eth1\nBRIDGE=br0\nIPADDR=10.1.1.1\nNETMASK=255.0.0.0\n");
        let decl = declared_from_ifcfg("eth1", &file);
        assert_eq!(decl.kind(), InterfaceKind::BridgePort);
        assert_eq!(decl.params().bridge.as_deref(), Some("br0"));
        assert!(decl.params().ipaddress.is_none());
    }

    #[test]
    fn test_captured_file_renders_back() {
        let original = "DEVICE=br0\nTYPE=Bridge\nBOOTPROTO=none\nIPADDR=192.168.100.1\n\
                        NETMASK=255.255.255.0\nONBOOT=yes\nSTP=no\nDELAY=0\n";
        let decl = declared_from_ifcfg("br0", &parse(original));
        let spec = InterfaceSpec::from_declared(&decl, &StaticFacts::new()).unwrap();
        let rendered = spec.render();
        assert_eq!(rendered.get("TYPE"), Some("Bridge"));
        assert_eq!(rendered.get("IPADDR"), Some("192.168.100.1"));
        assert_eq!(rendered.get("STP"), Some("no"));
        assert_eq!(rendered.get("DELAY"), Some("0"));
    }

    #[test]
    fn test_non_boolean_flag_kept_for_validation() {
        let decl = declared_from_ifcfg("eth0", &parse("BOOTPROTO=dhcp\nPEERDNS=maybe\n"));
        assert_eq!(decl.params().peerdns, Some(FlagValue::Text("maybe".into())));
    }

    #[test]
    fn test_capture_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ifcfg-eth0"), "BOOTPROTO=dhcp\n").unwrap();
        std::fs::write(dir.path().join("ifcfg-eth0.bak"), "BOOTPROTO=dhcp\n").unwrap();
        std::fs::write(dir.path().join("ifcfg-lo"), "DEVICE=lo\n").unwrap();
        std::fs::write(
            dir.path().join("ifcfg-br0"),
            "TYPE=Bridge\nIPADDR=10.0.0.1\nNETMASK=255.0.0.0\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("route-eth0"), "10.0.0.0/8 via 10.0.0.1\n").unwrap();

        let config = capture_dir(dir.path(), &[]).unwrap();
        let names: Vec<_> = config.interfaces().iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["br0", "eth0"]);
        assert_eq!(config.settings().config_dir, dir.path());

        let only = capture_dir(dir.path(), &["eth0".to_string()]).unwrap();
        assert_eq!(only.interfaces().len(), 1);
    }
}
