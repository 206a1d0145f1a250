//! The host collaborators bundled together.

use crate::config::Settings;
use crate::config::apply::Reconciler;
use crate::facts::{FactProvider, SysfsFacts};
use crate::lock::LockRegistry;
use crate::package::{PackageEnsurer, SystemPackages};
use crate::runner::{CommandRunner, SystemRunner};

/// Settings plus the command runner, fact provider and package ensurer
/// every configuration operation works through.
#[derive(Debug, Clone)]
pub struct Host<R, F, P> {
    settings: Settings,
    runner: R,
    facts: F,
    packages: P,
    locks: LockRegistry,
}

/// A host backed by real processes and sysfs.
pub type SystemHost = Host<SystemRunner, SysfsFacts, SystemPackages<SystemRunner>>;

impl SystemHost {
    /// Build the real collaborators from settings.
    pub fn system(settings: Settings) -> Self {
        let runner = SystemRunner::new(settings.command_timeout());
        let facts = SysfsFacts::with_root(&settings.sysfs_root);
        let packages = SystemPackages::new(runner.clone(), settings.package_manager);
        Self::new(settings, runner, facts, packages)
    }
}

impl<R, F, P> Host<R, F, P>
where
    R: CommandRunner + Sync,
    F: FactProvider,
    P: PackageEnsurer,
{
    /// Bundle collaborators.
    pub fn new(settings: Settings, runner: R, facts: F, packages: P) -> Self {
        Self {
            settings,
            runner,
            facts,
            packages,
            locks: LockRegistry::new(),
        }
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the command runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Get the fact provider.
    pub fn facts(&self) -> &F {
        &self.facts
    }

    /// Get the package ensurer.
    pub fn packages(&self) -> &P {
        &self.packages
    }

    /// Create a reconciler sharing this host's runner and per-name locks.
    pub fn reconciler(&self) -> Reconciler<&R> {
        Reconciler::new(self.settings.clone(), &self.runner).with_locks(self.locks.clone())
    }
}
