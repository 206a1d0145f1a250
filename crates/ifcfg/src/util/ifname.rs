//! Interface name utilities.

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = 16;

/// Error type for interface names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IfError {
    #[error("invalid interface name: {0}")]
    InvalidName(String),
}

pub type Result<T> = std::result::Result<T, IfError>;

/// Validate an interface name.
///
/// Alias labels (`eth0:1`) are accepted; the kernel never sees them but
/// they are legal ifcfg device names.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(IfError::InvalidName("empty name".to_string()));
    }

    if name.len() >= IFNAMSIZ {
        return Err(IfError::InvalidName(format!(
            "name too long (max {} chars)",
            IFNAMSIZ - 1
        )));
    }

    if name.contains('/') || name.contains('\0') {
        return Err(IfError::InvalidName(
            "name contains invalid characters".to_string(),
        ));
    }

    if name.chars().any(|c| c.is_whitespace()) {
        return Err(IfError::InvalidName("name contains whitespace".to_string()));
    }

    if name == "." || name == ".." {
        return Err(IfError::InvalidName("name is a path component".to_string()));
    }

    Ok(())
}

/// Split a trailing `.<digits>` VLAN suffix off a device name.
fn split_vlan(device: &str) -> Option<(&str, &str)> {
    let (base, suffix) = device.rsplit_once('.')?;
    if base.is_empty() || suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((base, suffix))
}

/// Strip a trailing `.<digits>` VLAN suffix: `eth0.100` -> `eth0`.
///
/// Names without a numeric suffix are returned unchanged.
pub fn base_device(device: &str) -> &str {
    split_vlan(device).map_or(device, |(base, _)| base)
}

/// Get the VLAN id encoded in a device name suffix, if any.
///
/// Returns `None` when there is no suffix or it does not fit in a u16.
pub fn vlan_id(device: &str) -> Option<u16> {
    split_vlan(device).and_then(|(_, id)| id.parse().ok())
}

/// Split an alias device `eth0:1` into (`eth0`, `1`).
pub fn alias_parent(device: &str) -> Option<(&str, &str)> {
    let (parent, label) = device.split_once(':')?;
    if parent.is_empty() || label.is_empty() || label.contains(':') {
        return None;
    }
    Some((parent, label))
}
