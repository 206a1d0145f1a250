//! Parameter validation.
//!
//! This module provides the [`Validatable`] trait and the checks run on
//! interface parameters before anything is rendered or written. Every
//! violation is collected, not just the first one.
//!
//! # Example
//!
//! ```
//! use ifcfg::config::{DeclaredInterface, InterfaceKind, InterfaceParams, OneOrMany};
//! use ifcfg::validation::Validatable;
//!
//! let params = InterfaceParams {
//!     ipaddress: Some(OneOrMany::from(["10.0.0.5", "10.0.0.6"])),
//!     netmask: Some(OneOrMany::from("255.255.255.0")),
//!     ..Default::default()
//! };
//! let iface = DeclaredInterface::new("eth0", InterfaceKind::Static, params);
//!
//! let result = iface.validate();
//! assert!(!result.is_valid());
//! for err in &result.errors {
//!     eprintln!("{}", err);
//! }
//! ```

use std::collections::HashSet;

use crate::config::render::MANAGED_KEYS;
use crate::config::{DeclaredInterface, FlagValue, InterfaceKind, InterfaceParams, NetworkConfig};
use crate::error::{Error, ValidationErrorInfo};
use crate::util::addr::{self, Ipv6Cidr, MacAddr};
use crate::util::ifname;

/// Smallest MTU accepted for IPv4.
pub const MIN_MTU: u32 = 68;
/// Largest MTU the kernel accepts.
pub const MAX_MTU: u32 = 65535;

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Rejects the interface.
    Error,
    /// Applied anyway; the offending input is ignored or overridden.
    Warning,
}

/// A single validation error or warning.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Field that failed validation.
    pub field: String,
    /// Description of the error.
    pub message: String,
    /// Severity of the issue.
    pub severity: ValidationSeverity,
}

impl ValidationError {
    /// Create a new validation error.
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Error,
        }
    }

    /// Create a new validation warning.
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Warning,
        }
    }

    /// Check if this is a warning.
    pub fn is_warning(&self) -> bool {
        self.severity == ValidationSeverity::Warning
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            ValidationSeverity::Error => "error",
            ValidationSeverity::Warning => "warning",
        };
        write!(f, "{} in '{}': {}", prefix, self.field, self.message)
    }
}

/// Result of validating parameters.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Violations that reject the interface.
    pub errors: Vec<ValidationError>,
    /// Issues that are reported but do not block.
    pub warnings: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create an empty validation result (valid).
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the parameters are valid (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check if there are any warnings.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Get total number of issues (errors + warnings).
    pub fn issue_count(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError::error(field, message));
    }

    /// Add a warning to the result.
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationError::warning(field, message));
    }

    /// Merge another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Convert to a Result, failing if there are any errors.
    ///
    /// `name` identifies the interface (or config) in the error.
    pub fn into_result(self, name: &str) -> Result<(), Error> {
        if self.is_valid() {
            Ok(())
        } else {
            let errors: Vec<ValidationErrorInfo> = self
                .errors
                .into_iter()
                .map(|e| ValidationErrorInfo::new(e.field, e.message))
                .collect();
            Err(Error::Validation {
                name: name.to_string(),
                errors,
            })
        }
    }

    /// Get all issues (errors first, then warnings).
    pub fn all_issues(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

/// Trait for types that can be validated before use.
pub trait Validatable {
    /// Validate this value.
    ///
    /// The value must not be rendered or applied if `result.is_valid()`
    /// returns false.
    fn validate(&self) -> ValidationResult;

    /// Check if this value is valid (no errors).
    fn is_valid(&self) -> bool {
        self.validate().is_valid()
    }
}

/// Validate an interface name.
pub fn validate_ifname(name: &str, field: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if let Err(e) = ifname::validate(name) {
        result.add_error(field, e.to_string());
        return result;
    }

    if name.starts_with('.') || name.starts_with('-') {
        result.add_warning(
            field,
            "interface name starting with '.' or '-' may cause issues",
        );
    }

    result
}

/// Validate a VLAN ID.
pub fn validate_vlan_id(vlan_id: u16, field: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if vlan_id == 0 || vlan_id > 4094 {
        result.add_error(field, format!("VLAN ID must be 1-4094, got {}", vlan_id));
    }

    result
}

/// Validate an MTU.
pub fn validate_mtu(mtu: u32, field: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if !(MIN_MTU..=MAX_MTU).contains(&mtu) {
        result.add_error(
            field,
            format!("MTU must be {}-{}, got {}", MIN_MTU, MAX_MTU, mtu),
        );
    }

    result
}

/// Validate a boolean flag.
pub fn validate_flag(value: &FlagValue, field: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if value.as_bool().is_none() {
        let shown = match value {
            FlagValue::Text(s) => s.as_str(),
            FlagValue::Bool(_) => "",
        };
        result.add_error(
            field,
            format!("expected true/false or yes/no, got '{}'", shown),
        );
    }

    result
}

/// Validate a free-form value that ends up on one line of the file.
pub fn validate_single_line(value: &str, field: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if value.contains('\n') || value.contains('\r') || value.contains('\0') {
        result.add_error(field, "value must be a single line");
    }

    result
}

/// Validate an extra option key: a shell variable name that is not one of
/// the keys managed through a dedicated parameter.
pub fn validate_option_key(key: &str, field: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    let mut chars = key.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        result.add_error(field, format!("'{}' is not a valid variable name", key));
        return result;
    }

    let upper = key.to_ascii_uppercase();
    if MANAGED_KEYS.contains(&upper.as_str()) || is_suffixed_address_key(&upper) {
        result.add_error(
            field,
            format!("{} is managed by a dedicated parameter", upper),
        );
    }

    result
}

fn is_suffixed_address_key(key: &str) -> bool {
    ["IPADDR", "NETMASK"].iter().any(|prefix| {
        key.strip_prefix(prefix)
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    })
}

impl InterfaceParams {
    /// Validate these parameters for an interface of the given kind.
    pub fn validate(&self, name: &str, kind: InterfaceKind) -> ValidationResult {
        let mut result = ValidationResult::new();

        result.merge(validate_ifname(name, "name"));
        let device = self.device.as_deref().unwrap_or(name);
        if self.device.is_some() {
            result.merge(validate_ifname(device, "device"));
        }

        for key in self.unknown.keys() {
            result.add_error(key.as_str(), "unknown parameter");
        }

        self.validate_ipv4(kind, &mut result);
        self.validate_ipv6(kind, &mut result);
        self.validate_misc(&mut result);
        self.validate_flags(&mut result);
        self.validate_kind(name, device, kind, &mut result);

        for (key, value) in &self.options {
            let field = format!("options.{}", key);
            result.merge(validate_option_key(key, &field));
            result.merge(validate_single_line(value, &field));
        }

        result
    }

    fn validate_ipv4(&self, kind: InterfaceKind, result: &mut ValidationResult) {
        let addresses = self.ipaddress.as_ref().map_or(&[][..], |v| v.as_slice());
        let netmasks = self.netmask.as_ref().map_or(&[][..], |v| v.as_slice());

        for address in addresses {
            if let Err(e) = addr::parse_ipv4(address) {
                result.add_error("ipaddress", e.to_string());
            }
        }
        for mask in netmasks {
            if let Err(e) = addr::parse_netmask(mask) {
                result.add_error("netmask", e.to_string());
            }
        }
        if addresses.len() != netmasks.len() {
            result.add_error(
                "netmask",
                format!(
                    "expected {} netmask(s) to match ipaddress, got {}",
                    addresses.len(),
                    netmasks.len()
                ),
            );
        }
        if let Some(gateway) = &self.gateway
            && let Err(e) = addr::parse_ipv4(gateway)
        {
            result.add_error("gateway", e.to_string());
        }

        let has_ipv4 = !addresses.is_empty() || !netmasks.is_empty() || self.gateway.is_some();
        let proto = kind.bootproto(self.bootproto);
        if has_ipv4 && !kind.accepts_ipv4() {
            result.add_warning(
                "ipaddress",
                format!("static IPv4 fields are ignored for a {} interface", kind),
            );
        } else if has_ipv4 && proto.is_dynamic() {
            result.add_warning(
                "ipaddress",
                format!("static IPv4 fields are ignored with bootproto {}", proto.as_str()),
            );
        }
    }

    fn validate_ipv6(&self, kind: InterfaceKind, result: &mut ValidationResult) {
        let addresses = self.ipv6address.as_ref().map_or(&[][..], |v| v.as_slice());

        for address in addresses {
            if let Err(e) = address.parse::<Ipv6Cidr>() {
                result.add_error("ipv6address", e.to_string());
            }
        }
        if let Some(gateway) = &self.ipv6gateway
            && let Err(e) = addr::parse_ipv6(gateway)
        {
            result.add_error("ipv6gateway", e.to_string());
        }

        let has_ipv6 = !addresses.is_empty() || self.ipv6gateway.is_some();
        if has_ipv6 && !kind.accepts_ipv6() {
            result.add_warning(
                "ipv6address",
                format!("IPv6 fields are ignored for a {} interface", kind),
            );
        }
    }

    fn validate_misc(&self, result: &mut ValidationResult) {
        if let Some(mac) = &self.macaddress {
            if let Err(e) = mac.parse::<MacAddr>() {
                result.add_error("macaddress", e.to_string());
            } else if self.manage_hwaddr.as_ref().and_then(|f| f.as_bool()) == Some(false) {
                result.add_warning(
                    "macaddress",
                    "ignored because manage_hwaddr is false",
                );
            }
        }

        if let Some(mtu) = self.mtu {
            result.merge(validate_mtu(mtu, "mtu"));
        }

        for (field, server) in [("dns1", &self.dns1), ("dns2", &self.dns2)] {
            if let Some(server) = server
                && let Err(e) = addr::parse_addr(server)
            {
                result.add_error(field, e.to_string());
            }
        }
        if self.dns2.is_some() && self.dns1.is_none() {
            result.add_warning("dns2", "dns2 without dns1 is written as the only nameserver");
        }

        let passthrough = [
            ("domain", &self.domain),
            ("zone", &self.zone),
            ("scope", &self.scope),
            ("metric", &self.metric),
            ("linkdelay", &self.linkdelay),
            ("ethtool_opts", &self.ethtool_opts),
            ("dhcp_hostname", &self.dhcp_hostname),
            ("delay", &self.delay),
            ("bridging_opts", &self.bridging_opts),
            ("bonding_opts", &self.bonding_opts),
            ("bridge", &self.bridge),
            ("master", &self.master),
        ];
        for (field, value) in passthrough {
            if let Some(value) = value {
                result.merge(validate_single_line(value, field));
            }
        }
    }

    fn validate_flags(&self, result: &mut ValidationResult) {
        let flags = [
            ("userctl", &self.userctl),
            ("manage_hwaddr", &self.manage_hwaddr),
            ("ipv6init", &self.ipv6init),
            ("ipv6autoconf", &self.ipv6autoconf),
            ("peerdns", &self.peerdns),
            ("ipv6peerdns", &self.ipv6peerdns),
            ("flush", &self.flush),
            ("defroute", &self.defroute),
            ("nm_controlled", &self.nm_controlled),
            ("stp", &self.stp),
        ];
        for (field, value) in flags {
            if let Some(value) = value {
                result.merge(validate_flag(value, field));
            }
        }
    }

    fn validate_kind(
        &self,
        name: &str,
        device: &str,
        kind: InterfaceKind,
        result: &mut ValidationResult,
    ) {
        if kind != InterfaceKind::Alias && device.contains(':') {
            result.add_error("device", "':' is only allowed in alias names");
        }

        match kind {
            InterfaceKind::Static => {
                if self.ipaddress.as_ref().is_none_or(|a| a.is_empty()) {
                    result.add_error("ipaddress", "required for a static interface");
                }
                if let Some(proto) = self.bootproto
                    && proto.is_dynamic()
                {
                    result.add_warning(
                        "bootproto",
                        format!("{} is ignored for a static interface", proto.as_str()),
                    );
                }
            }
            InterfaceKind::Dynamic => {}
            InterfaceKind::BridgePort => match &self.bridge {
                None => result.add_error("bridge", "required for a bridge port"),
                Some(bridge) => result.merge(validate_ifname(bridge, "bridge")),
            },
            InterfaceKind::BondSlave => match &self.master {
                None => result.add_error("master", "required for a bond slave"),
                Some(master) => result.merge(validate_ifname(master, "master")),
            },
            InterfaceKind::Alias => {
                if ifname::alias_parent(device).is_none() {
                    result.add_error(
                        "name",
                        format!("alias '{}' must be <parent>:<label>", device),
                    );
                }
                if self.macaddress.is_some() {
                    result.add_warning("macaddress", "aliases share the parent's hardware");
                }
            }
            InterfaceKind::Vlan => match ifname::vlan_id(device) {
                Some(id) => result.merge(validate_vlan_id(id, "name")),
                None => result.add_error(
                    "name",
                    format!("VLAN '{}' must be <parent>.<id>", device),
                ),
            },
            InterfaceKind::Bridge | InterfaceKind::Bond => {}
        }

        let misplaced = [
            ("stp", self.stp.is_some(), InterfaceKind::Bridge),
            ("delay", self.delay.is_some(), InterfaceKind::Bridge),
            ("bridging_opts", self.bridging_opts.is_some(), InterfaceKind::Bridge),
            ("bridge", self.bridge.is_some(), InterfaceKind::BridgePort),
            ("bonding_opts", self.bonding_opts.is_some(), InterfaceKind::Bond),
            ("master", self.master.is_some(), InterfaceKind::BondSlave),
        ];
        for (field, present, owner) in misplaced {
            if present && kind != owner {
                result.add_warning(
                    field,
                    format!("only used by {} interfaces, ignored for {}", owner, name),
                );
            }
        }
    }
}

impl Validatable for DeclaredInterface {
    fn validate(&self) -> ValidationResult {
        self.params().validate(self.name(), self.kind())
    }
}

impl Validatable for NetworkConfig {
    /// Validates every interface, with fields prefixed by the interface
    /// name, and rejects duplicate names.
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        let mut seen = HashSet::new();

        for iface in self.interfaces() {
            if !seen.insert(iface.name()) {
                result.add_error(
                    format!("interfaces[{}]", iface.name()),
                    "duplicate interface name",
                );
            }

            let inner = iface.validate();
            let prefix = |e: ValidationError| ValidationError {
                field: format!("interfaces[{}].{}", iface.name(), e.field),
                ..e
            };
            result.errors.extend(inner.errors.into_iter().map(prefix));
            result.warnings.extend(inner.warnings.into_iter().map(prefix));
        }

        result
    }
}
