//! Error types for interface reconciliation.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type for ifcfg operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A single validation failure attached to [`Error::Validation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrorInfo {
    /// Parameter that failed validation.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationErrorInfo {
    /// Create a new validation error entry.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_violations(errors: &[ValidationErrorInfo]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur while validating, rendering or applying interfaces.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Parameters were rejected before any I/O took place.
    #[error("invalid parameters for {name}: {}", join_violations(.errors))]
    Validation {
        /// Interface the parameters belong to.
        name: String,
        /// Every violation found.
        errors: Vec<ValidationErrorInfo>,
    },

    /// Plain I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// I/O error on a specific path (write, rename, read).
    #[error("{}: {source}", .path.display())]
    File {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// An activation command exited non-zero.
    #[error("{action} of {name} failed: `{command}` exited with {}: {output}", .status.map_or_else(|| "signal".to_string(), |s| s.to_string()))]
    Activation {
        /// Interface being activated.
        name: String,
        /// Step that failed (reload, up, down).
        action: String,
        /// Command line that was run.
        command: String,
        /// Exit status, `None` when killed by a signal.
        status: Option<i32>,
        /// Captured stderr (stdout when stderr was empty).
        output: String,
    },

    /// An external command did not finish in time.
    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout {
        /// Command line that was run.
        command: String,
        /// Configured timeout.
        timeout: Duration,
    },

    /// Removing stale connections failed.
    #[error("cleanup of {name} failed: {message}")]
    Cleanup {
        /// Interface being cleaned up.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// A required package could not be installed.
    #[error("package {package} could not be installed: {output}")]
    Package {
        /// Package name.
        package: String,
        /// Exit status of the installer.
        status: Option<i32>,
        /// Installer output.
        output: String,
    },

    /// An existing ifcfg file could not be parsed.
    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Parser message.
        message: String,
    },

    /// YAML manifest error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON manifest error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error with a single violation.
    pub fn invalid(
        name: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            name: name.into(),
            errors: vec![ValidationErrorInfo::new(field, message)],
        }
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    /// Check if this error was raised before any side effect.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error came from an external activation command.
    pub fn is_activation(&self) -> bool {
        matches!(self, Self::Activation { .. } | Self::Timeout { .. })
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Io(e) | Self::File { source: e, .. } => {
                e.kind() == io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }

    /// Get the exit status of the failed command, if any.
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            Self::Activation { status, .. } | Self::Package { status, .. } => *status,
            _ => None,
        }
    }

    /// Get the validation violations, empty for other errors.
    pub fn violations(&self) -> &[ValidationErrorInfo] {
        match self {
            Self::Validation { errors, .. } => errors,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_violation() {
        let err = Error::Validation {
            name: "eth0".into(),
            errors: vec![
                ValidationErrorInfo::new("ipaddress", "invalid IPv4 address: 10.0.0"),
                ValidationErrorInfo::new("netmask", "expected 2 netmasks, got 1"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("invalid parameters for eth0"));
        assert!(msg.contains("ipaddress: invalid IPv4 address: 10.0.0"));
        assert!(msg.contains("netmask: expected 2 netmasks, got 1"));
        assert!(err.is_validation());
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_activation_error_carries_status() {
        let err = Error::Activation {
            name: "eth0".into(),
            action: "up".into(),
            command: "nmcli connection up ifname eth0".into(),
            status: Some(4),
            output: "Error: Connection activation failed".into(),
        };
        assert!(err.is_activation());
        assert_eq!(err.exit_status(), Some(4));
        assert!(err.to_string().contains("exited with 4"));
    }

    #[test]
    fn test_activation_error_killed_by_signal() {
        let err = Error::Activation {
            name: "eth0".into(),
            action: "reload".into(),
            command: "nmcli connection load /x".into(),
            status: None,
            output: String::new(),
        };
        assert!(err.to_string().contains("exited with signal"));
    }

    #[test]
    fn test_timeout_is_activation() {
        let err = Error::Timeout {
            command: "ifup eth0".into(),
            timeout: Duration::from_secs(30),
        };
        assert!(err.is_activation());
        assert_eq!(err.to_string(), "`ifup eth0` timed out after 30s");
    }

    #[test]
    fn test_permission_denied() {
        let err = Error::file(
            "/etc/sysconfig/network-scripts/ifcfg-eth0",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(err.is_permission_denied());
        assert!(!Error::invalid("eth0", "mtu", "too small").is_permission_denied());
    }
}
