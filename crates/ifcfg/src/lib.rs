//! Declarative management of Linux ifcfg network-scripts.
//!
//! This crate keeps `/etc/sysconfig/network-scripts/ifcfg-*` files in a
//! declared state and activates them through NetworkManager or the legacy
//! initscripts. Static, DHCP, bridge, bond, alias and VLAN interfaces are
//! supported.
//!
//! Each interface goes through the same pipeline: parameters are validated,
//! normalized into an [`InterfaceSpec`](config::InterfaceSpec), rendered to
//! ordered `KEY=value` lines and reconciled against the file on disk. A file
//! is only written when its bytes change, and only a written file triggers
//! reload, activation and stale connection cleanup.
//!
//! # Example
//!
//! ```ignore
//! use ifcfg::config::NetworkConfig;
//! use ifcfg::host::SystemHost;
//!
//! #[tokio::main]
//! async fn main() -> ifcfg::Result<()> {
//!     let config = NetworkConfig::new()
//!         .static_interface("eth0", |i| {
//!             i.address("10.0.0.5", "255.255.255.0")
//!                 .address("10.0.0.6", "255.255.255.0")
//!                 .gateway("10.0.0.1")
//!         });
//!
//!     let host = SystemHost::system(config.settings().clone());
//!     let result = config.apply(&host).await?;
//!     println!("{}", result.summary_text());
//!     Ok(())
//! }
//! ```
//!
//! # Loading a manifest
//!
//! ```ignore
//! let config = ifcfg::config::NetworkConfig::from_path("/etc/ifcfg.yaml")?;
//! ```
//!
//! Host collaborators are traits ([`CommandRunner`](runner::CommandRunner),
//! [`FactProvider`](facts::FactProvider),
//! [`PackageEnsurer`](package::PackageEnsurer)) so the whole pipeline runs
//! against scripted implementations in tests.

pub mod config;
pub mod error;
pub mod facts;
pub mod host;
pub mod lock;
pub mod package;
pub mod runner;
pub mod util;
pub mod validation;

pub use config::{InterfaceKind, InterfaceSpec, NetworkConfig};
pub use error::{Error, Result};
pub use host::{Host, SystemHost};
