//! Package presence.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::runner::{CommandRunner, ToolCommand};

/// Installer used for missing packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Yum,
    Dnf,
}

impl PackageManager {
    /// Get the installer binary name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yum => "yum",
            Self::Dnf => "dnf",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageManager {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yum" => Ok(Self::Yum),
            "dnf" => Ok(Self::Dnf),
            _ => Err(format!("unknown package manager: {}", s)),
        }
    }
}

/// Makes sure a package is installed.
pub trait PackageEnsurer {
    /// Install `package` if it is absent. Returns true if it was installed.
    fn ensure(&self, package: &str) -> impl Future<Output = Result<bool>> + Send;
}

impl<T: PackageEnsurer + Sync + ?Sized> PackageEnsurer for &T {
    fn ensure(&self, package: &str) -> impl Future<Output = Result<bool>> + Send {
        (**self).ensure(package)
    }
}

impl<T: PackageEnsurer + Send + Sync + ?Sized> PackageEnsurer for Arc<T> {
    fn ensure(&self, package: &str) -> impl Future<Output = Result<bool>> + Send {
        (**self).ensure(package)
    }
}

/// Queries `rpm` and installs through yum or dnf.
#[derive(Debug, Clone)]
pub struct SystemPackages<R> {
    runner: R,
    manager: PackageManager,
}

impl<R: CommandRunner + Sync> SystemPackages<R> {
    /// Create an ensurer running its commands through `runner`.
    pub fn new(runner: R, manager: PackageManager) -> Self {
        Self { runner, manager }
    }
}

impl<R: CommandRunner + Sync> PackageEnsurer for SystemPackages<R> {
    async fn ensure(&self, package: &str) -> Result<bool> {
        let query = ToolCommand::new("rpm").args(["-q", package]);
        if self.runner.run(&query).await?.is_success() {
            return Ok(false);
        }

        let install = ToolCommand::new(self.manager.as_str()).args(["-y", "install", package]);
        info!(package, command = %install, "installing package");
        let out = self.runner.run(&install).await?;
        if !out.is_success() {
            return Err(Error::Package {
                package: package.to_string(),
                status: out.status,
                output: out.diagnostic().to_string(),
            });
        }
        Ok(true)
    }
}

/// Assumes every package is present. Used for dry runs and rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeInstalled;

impl PackageEnsurer for AssumeInstalled {
    async fn ensure(&self, _package: &str) -> Result<bool> {
        Ok(false)
    }
}
