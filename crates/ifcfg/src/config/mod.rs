//! Declarative interface configuration.
//!
//! Describe the interfaces a host should have and let the library render,
//! compare and converge the ifcfg files:
//!
//! ```ignore
//! use ifcfg::config::NetworkConfig;
//! use ifcfg::host::SystemHost;
//!
//! let config = NetworkConfig::new()
//!     .bridge("br0", |b| b.address("192.168.100.1", "255.255.255.0").stp(false))
//!     .bridge_port("eth1", |p| p.bridge("br0"))
//!     .dynamic_interface("eth0", |i| i.peerdns(true));
//!
//! let host = SystemHost::system(config.settings().clone());
//!
//! // Preview changes
//! let diff = config.diff(&host).await?;
//! println!("{}", diff.summary());
//!
//! // Apply changes
//! config.apply(&host).await?;
//! ```
//!
//! Interfaces are applied masters first (bridges, bonds), then their
//! ports and slaves, then plain interfaces and VLANs, then aliases.

pub mod apply;
pub mod capture;
mod diff;
mod kinds;
mod normalize;
pub mod parse;
pub mod render;
mod settings;
mod types;

pub use apply::{Action, ActivationPolicy, ApplyResult, ReconcileState, Reconciler, Step};
pub use diff::{ConfigDiff, FileDiff};
pub use kinds::{BRIDGE_PACKAGE, InterfaceKind};
pub use parse::IfcfgFile;
pub use render::RenderedConfig;
pub use settings::{
    DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_CONFIG_DIR, DEFAULT_STATE_DIR, Settings,
};
pub use types::*;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::facts::FactProvider;
use crate::host::Host;
use crate::package::PackageEnsurer;
use crate::runner::CommandRunner;
use crate::validation::Validatable;

/// Options for applying a configuration.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Don't touch files or run commands, just compute what would be done.
    pub dry_run: bool,
    /// Keep going with other interfaces when one fails.
    pub continue_on_error: bool,
    /// Reload and bring interfaces up/down after writing. When false only
    /// files are written.
    pub activate: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            continue_on_error: false,
            activate: true,
        }
    }
}

/// An error that occurred while applying one interface.
#[derive(Debug)]
pub struct ApplyError {
    /// Interface name.
    pub name: String,
    /// What was being done.
    pub operation: String,
    /// The underlying error.
    pub error: Error,
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.operation, self.name, self.error)
    }
}

/// Result of applying a whole configuration.
#[derive(Debug, Default)]
pub struct ConfigApplyResult {
    /// Per-interface outcomes, in apply order.
    pub results: Vec<ApplyResult>,
    /// Interfaces skipped before reconciliation (invalid parameters, missing
    /// packages) when `continue_on_error` is set.
    pub errors: Vec<ApplyError>,
    /// Number of files changed (or that would change in a dry run).
    pub changes_made: usize,
}

impl ConfigApplyResult {
    /// Check if every interface converged.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.results.iter().all(ApplyResult::is_success)
    }

    /// Number of interfaces that did not converge.
    pub fn failure_count(&self) -> usize {
        self.errors.len() + self.results.iter().filter(|r| !r.is_success()).count()
    }

    /// Get a human-readable summary.
    pub fn summary_text(&self) -> String {
        let mut lines: Vec<String> = self.results.iter().map(ApplyResult::summary).collect();
        lines.extend(self.errors.iter().map(|e| e.to_string()));
        if lines.is_empty() {
            "No interfaces configured".to_string()
        } else {
            lines.join("\n")
        }
    }
}

impl NetworkConfig {
    /// Validate every interface and build the canonical records, in apply
    /// order.
    ///
    /// Fails on the first invalid interface, before any side effect.
    pub fn normalize<R, F, P>(&self, host: &Host<R, F, P>) -> Result<Vec<InterfaceSpec>>
    where
        R: CommandRunner + Sync,
        F: FactProvider,
        P: PackageEnsurer,
    {
        self.check_names()?;
        let mut specs = self
            .ordered()
            .into_iter()
            .map(|decl| InterfaceSpec::from_declared(decl, host.facts()))
            .collect::<Result<Vec<_>>>()?;
        specs.sort_by_key(|s| s.kind().kind().apply_rank());
        Ok(specs)
    }

    /// Render every interface file, in apply order.
    pub fn render<R, F, P>(&self, host: &Host<R, F, P>) -> Result<Vec<RenderedConfig>>
    where
        R: CommandRunner + Sync,
        F: FactProvider,
        P: PackageEnsurer,
    {
        Ok(self
            .normalize(host)?
            .iter()
            .map(InterfaceSpec::render)
            .collect())
    }

    /// Compare the rendered files with what is on disk.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let diff = config.diff(&host).await?;
    /// if !diff.is_empty() {
    ///     println!("Changes needed:\n{}", diff.summary());
    /// }
    /// ```
    pub async fn diff<R, F, P>(&self, host: &Host<R, F, P>) -> Result<ConfigDiff>
    where
        R: CommandRunner + Sync,
        F: FactProvider,
        P: PackageEnsurer,
    {
        let mut diff = ConfigDiff::default();
        for rendered in self.render(host)? {
            let path = host.settings().ifcfg_path(rendered.name());
            let existing = match tokio::fs::read_to_string(&path).await {
                Ok(content) => Some(content),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(Error::file(&path, e)),
            };
            let marker = host.settings().pending_path(rendered.name());

            let mut file = FileDiff::compute(path, existing.as_deref(), &rendered);
            file.pending = tokio::fs::try_exists(&marker)
                .await
                .map_err(|e| Error::file(&marker, e))?;
            if file.is_empty() {
                diff.unchanged.push(file.name);
            } else {
                diff.files.push(file);
            }
        }
        Ok(diff)
    }

    /// Converge every interface.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let result = config.apply(&host).await?;
    /// println!("Changed {} file(s)", result.changes_made);
    /// ```
    pub async fn apply<R, F, P>(&self, host: &Host<R, F, P>) -> Result<ConfigApplyResult>
    where
        R: CommandRunner + Sync,
        F: FactProvider,
        P: PackageEnsurer,
    {
        self.apply_with_options(host, ApplyOptions::default()).await
    }

    /// Converge every interface with custom options.
    ///
    /// Without `continue_on_error` all interfaces are validated before the
    /// first file is touched, and the first failure is returned as `Err`.
    pub async fn apply_with_options<R, F, P>(
        &self,
        host: &Host<R, F, P>,
        options: ApplyOptions,
    ) -> Result<ConfigApplyResult>
    where
        R: CommandRunner + Sync,
        F: FactProvider,
        P: PackageEnsurer,
    {
        self.check_names()?;
        let mut result = ConfigApplyResult::default();

        let mut specs = Vec::new();
        for decl in self.ordered() {
            match InterfaceSpec::from_declared(decl, host.facts()) {
                Ok(spec) => specs.push(spec),
                Err(e) if options.continue_on_error => {
                    warn!(interface = %decl.name(), error = %e, "skipping invalid interface");
                    result.errors.push(ApplyError {
                        name: decl.name().to_string(),
                        operation: "validate".to_string(),
                        error: e,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let settings = host.settings();
        let reconciler = host.reconciler().dry_run(options.dry_run);

        for spec in &specs {
            let kind = spec.kind().kind();
            let content = spec.render().content();

            // Lookup errors resurface from reconcile below.
            if let Some(package) = kind.required_package()
                && !options.dry_run
                && !matches!(reconciler.is_converged(spec.name(), &content).await, Ok(true))
                && let Err(e) = host.packages().ensure(package).await
            {
                if !options.continue_on_error {
                    return Err(e);
                }
                result.errors.push(ApplyError {
                    name: spec.name().to_string(),
                    operation: format!("install {}", package),
                    error: e,
                });
                continue;
            }

            let policy = ActivationPolicy {
                reload: settings.reload && options.activate,
                ensure: options.activate.then_some(spec.ensure()),
                flush: spec.flags().flush,
                cleanup: settings.cleanup && options.activate,
                parent: match spec.kind() {
                    KindSettings::Alias { parent } => Some(parent.clone()),
                    _ => None,
                },
            };
            let mut outcome = reconciler
                .reconcile(spec.name(), spec.device(), &content, &policy)
                .await;

            if outcome.changed {
                result.changes_made += 1;
            }
            if let Some(e) = outcome.failure.take() {
                if !options.continue_on_error {
                    return Err(e);
                }
                outcome.failure = Some(e);
            } else {
                info!(interface = %spec.name(), changed = outcome.changed, "reconciled");
            }
            result.results.push(outcome);
        }

        Ok(result)
    }

    fn check_names(&self) -> Result<()> {
        let validation = self.validate();
        let duplicates: Vec<_> = validation
            .errors
            .into_iter()
            .filter(|e| e.message == "duplicate interface name")
            .collect();
        if duplicates.is_empty() {
            return Ok(());
        }
        let mut result = crate::validation::ValidationResult::new();
        result.errors = duplicates;
        result.into_result("config")
    }

    fn ordered(&self) -> Vec<&DeclaredInterface> {
        let mut ordered: Vec<_> = self.interfaces.iter().collect();
        ordered.sort_by_key(|d| d.kind().apply_rank());
        ordered
    }
}
