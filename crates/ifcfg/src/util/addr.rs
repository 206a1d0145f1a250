//! Address parsing and formatting utilities.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error type for address parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddrError {
    #[error("invalid IPv4 address: {0}")]
    InvalidIpv4(String),

    #[error("invalid IPv6 address: {0}")]
    InvalidIpv6(String),

    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    #[error("invalid netmask: {0}")]
    InvalidNetmask(String),

    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),
}

pub type Result<T> = std::result::Result<T, AddrError>;

/// Parse an IPv4 address in dotted-quad form.
pub fn parse_ipv4(s: &str) -> Result<Ipv4Addr> {
    s.trim()
        .parse()
        .map_err(|_| AddrError::InvalidIpv4(s.to_string()))
}

/// Parse an IPv6 address (without prefix).
pub fn parse_ipv6(s: &str) -> Result<Ipv6Addr> {
    s.trim()
        .parse()
        .map_err(|_| AddrError::InvalidIpv6(s.to_string()))
}

/// Parse an IP address of either family.
pub fn parse_addr(s: &str) -> Result<IpAddr> {
    s.trim()
        .parse()
        .map_err(|_| AddrError::InvalidAddress(s.to_string()))
}

/// Parse a dotted-quad netmask, rejecting non-contiguous masks.
pub fn parse_netmask(s: &str) -> Result<Ipv4Addr> {
    let mask = parse_ipv4(s).map_err(|_| AddrError::InvalidNetmask(s.to_string()))?;
    let bits = u32::from(mask);
    // Contiguous masks are a run of ones followed by a run of zeros.
    if bits.leading_ones() + bits.trailing_zeros() != 32 {
        return Err(AddrError::InvalidNetmask(s.to_string()));
    }
    Ok(mask)
}

/// Convert a contiguous netmask to its prefix length.
pub fn netmask_to_prefix(mask: Ipv4Addr) -> u8 {
    u32::from(mask).leading_ones() as u8
}

/// Convert a prefix length (0-32) to a dotted-quad netmask.
pub fn prefix_to_netmask(prefix: u8) -> Result<Ipv4Addr> {
    match prefix {
        0 => Ok(Ipv4Addr::UNSPECIFIED),
        1..=32 => Ok(Ipv4Addr::from(!0u32 << (32 - u32::from(prefix)))),
        _ => Err(AddrError::InvalidPrefix(prefix.to_string())),
    }
}

/// An IPv6 address with an optional prefix length, as written in
/// `IPV6ADDR=2001:db8::1/64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv6Cidr {
    address: Ipv6Addr,
    prefix: Option<u8>,
}

impl Ipv6Cidr {
    /// Create a new address with an optional prefix length.
    pub fn new(address: Ipv6Addr, prefix: Option<u8>) -> Result<Self> {
        if let Some(p) = prefix
            && p > 128
        {
            return Err(AddrError::InvalidPrefix(format!(
                "{} exceeds maximum 128 for IPv6",
                p
            )));
        }
        Ok(Self { address, prefix })
    }

    /// Get the address.
    pub fn address(&self) -> Ipv6Addr {
        self.address
    }

    /// Get the prefix length, if one was given.
    pub fn prefix(&self) -> Option<u8> {
        self.prefix
    }
}

impl FromStr for Ipv6Cidr {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once('/') {
            Some((addr_str, prefix_str)) => {
                let address = parse_ipv6(addr_str)?;
                if prefix_str.is_empty() || !prefix_str.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(AddrError::InvalidPrefix(prefix_str.to_string()));
                }
                let prefix: u8 = prefix_str
                    .parse()
                    .map_err(|_| AddrError::InvalidPrefix(prefix_str.to_string()))?;
                Self::new(address, Some(prefix))
            }
            None => Self::new(parse_ipv6(s)?, None),
        }
    }
}

impl fmt::Display for Ipv6Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(p) => write!(f, "{}/{}", self.address, p),
            None => write!(f, "{}", self.address),
        }
    }
}

/// A 48-bit Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// Create from raw octets.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Get the raw octets.
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddr {
    type Err = AddrError;

    /// Accepts `aa:bb:cc:dd:ee:ff` and `aa-bb-cc-dd-ee-ff`, any case.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let sep = if trimmed.contains('-') { '-' } else { ':' };
        let parts: Vec<&str> = trimmed.split(sep).collect();
        if parts.len() != 6 {
            return Err(AddrError::InvalidMac(s.to_string()));
        }

        let mut mac = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            // from_str_radix alone would take a sign, as in "+a".
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(AddrError::InvalidMac(s.to_string()));
            }
            mac[i] =
                u8::from_str_radix(part, 16).map_err(|_| AddrError::InvalidMac(s.to_string()))?;
        }

        Ok(Self(mac))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
