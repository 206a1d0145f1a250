//! Shared utilities for ifcfg.

pub mod addr;
pub mod ifname;

pub use addr::{Ipv6Cidr, MacAddr, parse_addr, parse_ipv4, parse_ipv6, parse_netmask};
pub use ifname::{alias_parent, base_device, vlan_id};
