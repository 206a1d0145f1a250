//! Reconciliation of one interface file and its live connection.
//!
//! [`Reconciler`] drives a fixed sequence per interface:
//!
//! ```text
//! Start -> Written -> Reloaded -> Activated -> Applied
//!    \________\__________\___________\______> Failed
//! ```
//!
//! The file is written only when its bytes differ. A pending-activation
//! marker is kept in the state directory from before the first command
//! until activation succeeds, so a retried apply resumes from `Written`
//! when an earlier run wrote the file and then failed to activate it.

use std::fmt;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::settings::Settings;
use super::types::Ensure;
use crate::error::{Error, Result};
use crate::lock::LockRegistry;
use crate::runner::{ActivationTool, CommandRunner, ToolCommand, parse_connections};

/// Mode of written ifcfg files.
pub const FILE_MODE: u32 = 0o644;

/// State of one reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileState {
    /// Nothing done yet.
    Start,
    /// The file holds the desired content.
    Written,
    /// The connection definition was reloaded (or no reload was requested).
    Reloaded,
    /// The interface was brought up or down (or no activation was requested).
    Activated,
    /// Terminal success.
    Applied,
    /// Terminal failure.
    Failed,
}

impl ReconcileState {
    /// Get the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Written => "written",
            Self::Reloaded => "reloaded",
            Self::Activated => "activated",
            Self::Applied => "applied",
            Self::Failed => "failed",
        }
    }

    /// Check if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Applied | Self::Failed)
    }
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which activation steps follow a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationPolicy {
    /// Reload the connection definition.
    pub reload: bool,
    /// Bring the interface up or down; `None` skips activation.
    pub ensure: Option<Ensure>,
    /// Flush addresses before bringing the interface up.
    pub flush: bool,
    /// Remove stale connections for the interface afterwards.
    pub cleanup: bool,
    /// Parent device of an alias. NetworkManager folds alias files into
    /// the parent's connection, so activation targets the parent.
    pub parent: Option<String>,
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        Self {
            reload: true,
            ensure: Some(Ensure::Up),
            flush: false,
            cleanup: true,
            parent: None,
        }
    }
}

impl ActivationPolicy {
    /// A policy that only writes the file.
    pub fn write_only() -> Self {
        Self {
            reload: false,
            ensure: None,
            flush: false,
            cleanup: false,
            parent: None,
        }
    }

    /// Check if any external command may run after the write.
    pub fn has_commands(&self) -> bool {
        self.reload || self.ensure.is_some() || self.cleanup
    }
}

/// Step an external command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Reload,
    Flush,
    Up,
    Down,
    ListConnections,
    DeleteConnection,
}

impl Step {
    /// Get the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reload => "reload",
            Self::Flush => "flush",
            Self::Up => "up",
            Self::Down => "down",
            Self::ListConnections => "list connections",
            Self::DeleteConnection => "delete connection",
        }
    }
}

/// Something the reconciler did (or would do in a dry run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// The file was (re)written.
    Write(PathBuf),
    /// An external command ran.
    Run { step: Step, command: ToolCommand },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write(path) => write!(f, "write {}", path.display()),
            Self::Run { step, command } => write!(f, "{}: {}", step.as_str(), command),
        }
    }
}

/// Outcome of reconciling one interface.
#[derive(Debug)]
pub struct ApplyResult {
    /// Interface name.
    pub name: String,
    /// The file content changed (or would change in a dry run).
    pub changed: bool,
    /// Final state: `Applied`, `Failed`, or `Start` for a dry run.
    pub state: ReconcileState,
    /// Last state reached before stopping.
    pub reached: ReconcileState,
    /// Actions in the order they were taken.
    pub actions: Vec<Action>,
    /// UUIDs of stale connections that were deleted.
    pub removed_connections: Vec<String>,
    /// Non-fatal cleanup failures.
    pub cleanup_errors: Vec<Error>,
    /// Why the reconciliation failed, when `state` is `Failed`.
    pub failure: Option<Error>,
}

impl ApplyResult {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            changed: false,
            state: ReconcileState::Start,
            reached: ReconcileState::Start,
            actions: Vec::new(),
            removed_connections: Vec::new(),
            cleanup_errors: Vec::new(),
            failure: None,
        }
    }

    /// Check if the reconciliation succeeded.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Number of external commands run.
    pub fn command_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::Run { .. }))
            .count()
    }

    /// Turn a failed outcome into its error.
    pub fn into_result(mut self) -> Result<Self> {
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }

    /// Get a one-line summary.
    pub fn summary(&self) -> String {
        let what = match (&self.failure, self.changed) {
            (Some(e), _) => format!("failed after {}: {}", self.reached, e),
            (None, true) => "updated".to_string(),
            (None, false) if self.command_count() > 0 => "activated".to_string(),
            (None, false) => "unchanged".to_string(),
        };
        let mut line = format!("{}: {}", self.name, what);
        if !self.removed_connections.is_empty() {
            line.push_str(&format!(
                " (removed {} stale connection(s))",
                self.removed_connections.len()
            ));
        }
        if !self.cleanup_errors.is_empty() {
            line.push_str(&format!(" ({} cleanup error(s))", self.cleanup_errors.len()));
        }
        line
    }
}

/// Writes interface files and drives their activation.
#[derive(Debug, Clone)]
pub struct Reconciler<R> {
    settings: Settings,
    runner: R,
    locks: LockRegistry,
    dry_run: bool,
}

impl<R: CommandRunner + Sync> Reconciler<R> {
    /// Create a reconciler.
    pub fn new(settings: Settings, runner: R) -> Self {
        Self {
            settings,
            runner,
            locks: LockRegistry::new(),
            dry_run: false,
        }
    }

    /// Share a lock registry with other reconcilers.
    pub fn with_locks(mut self, locks: LockRegistry) -> Self {
        self.locks = locks;
        self
    }

    /// Only compute what would be done.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn tool(&self) -> ActivationTool {
        self.settings.tool
    }

    /// Reconcile one interface, failing on the first hard error.
    ///
    /// Cleanup failures are not hard errors; they are returned in
    /// [`ApplyResult::cleanup_errors`].
    pub async fn apply(
        &self,
        name: &str,
        device: &str,
        content: &str,
        policy: &ActivationPolicy,
    ) -> Result<ApplyResult> {
        self.reconcile(name, device, content, policy)
            .await
            .into_result()
    }

    /// Reconcile one interface and report the outcome, failed or not.
    pub async fn reconcile(
        &self,
        name: &str,
        device: &str,
        content: &str,
        policy: &ActivationPolicy,
    ) -> ApplyResult {
        let _guard = self.locks.lock(name).await;
        let mut result = ApplyResult::new(name);

        if let Err(e) = self.run(&mut result, device, content, policy).await {
            warn!(interface = %name, state = %result.state, error = %e, "reconciliation failed");
            result.reached = result.state;
            result.state = ReconcileState::Failed;
            result.failure = Some(e);
        }
        result
    }

    /// Check if the file for `name` already holds `content` and no
    /// activation is pending, so reconciling it would run nothing.
    pub async fn is_converged(&self, name: &str, content: &str) -> Result<bool> {
        let (changed, pending) = self.status(name, content).await?;
        Ok(!changed && !pending)
    }

    /// Whether the file differs from `content`, and whether a marker exists.
    async fn status(&self, name: &str, content: &str) -> Result<(bool, bool)> {
        let path = self.settings.ifcfg_path(name);
        let marker = self.settings.pending_path(name);

        let existing = read_optional(&path).await?;
        let changed = existing.as_deref() != Some(content.as_bytes());
        let pending = tokio::fs::try_exists(&marker)
            .await
            .map_err(|e| Error::file(&marker, e))?;
        Ok((changed, pending))
    }

    async fn run(
        &self,
        result: &mut ApplyResult,
        device: &str,
        content: &str,
        policy: &ActivationPolicy,
    ) -> Result<()> {
        let name = result.name.clone();
        let path = self.settings.ifcfg_path(&name);
        let marker = self.settings.pending_path(&name);
        let (changed, pending) = self.status(&name, content).await?;

        if !changed && !pending {
            debug!(interface = %name, path = %path.display(), "file unchanged");
            result.state = ReconcileState::Applied;
            result.reached = ReconcileState::Applied;
            return Ok(());
        }
        result.changed = changed;

        if self.dry_run {
            if changed {
                result.actions.push(Action::Write(path.clone()));
            }
            self.plan(result, &path, device, policy);
            return Ok(());
        }

        // Start -> Written
        if policy.has_commands() && !pending {
            write_marker(&marker).await?;
        }
        if changed {
            if let Err(e) = write_atomic(&path, content).await {
                if !pending {
                    let _ = tokio::fs::remove_file(&marker).await;
                }
                return Err(e);
            }
            result.actions.push(Action::Write(path.clone()));
            info!(interface = %name, path = %path.display(), "wrote file");
        } else {
            info!(interface = %name, "resuming pending activation");
        }
        self.transition(result, ReconcileState::Written);

        // Written -> Reloaded
        if policy.reload
            && let Some(cmd) = self.tool().reload_command(&path.to_string_lossy())
        {
            self.exec(result, Step::Reload, cmd).await?;
        }
        self.transition(result, ReconcileState::Reloaded);

        // Reloaded -> Activated
        if policy.ensure.is_none() {
            debug!(interface = %name, "activation skipped");
        }
        for (step, cmd) in self.activation_steps(&name, device, policy) {
            self.exec(result, step, cmd).await?;
        }
        if let Err(e) = tokio::fs::remove_file(&marker).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            return Err(Error::file(&marker, e));
        }
        self.transition(result, ReconcileState::Activated);

        // Activated -> Applied
        if policy.cleanup {
            self.cleanup(result, &path).await;
        }
        self.transition(result, ReconcileState::Applied);
        Ok(())
    }

    fn transition(&self, result: &mut ApplyResult, to: ReconcileState) {
        debug!(interface = %result.name, from = %result.state, to = %to, "transition");
        result.state = to;
        result.reached = to;
    }

    fn plan(&self, result: &mut ApplyResult, path: &Path, device: &str, policy: &ActivationPolicy) {
        let tool = self.tool();
        let mut planned = Vec::new();
        if policy.reload
            && let Some(cmd) = tool.reload_command(&path.to_string_lossy())
        {
            planned.push((Step::Reload, cmd));
        }
        planned.extend(self.activation_steps(&result.name, device, policy));
        if policy.cleanup
            && let Some(cmd) = tool.list_connections_command()
        {
            planned.push((Step::ListConnections, cmd));
        }
        result.actions.extend(
            planned
                .into_iter()
                .map(|(step, command)| Action::Run { step, command }),
        );
    }

    /// Commands that bring `name` to its ensured state.
    fn activation_steps(
        &self,
        name: &str,
        device: &str,
        policy: &ActivationPolicy,
    ) -> Vec<(Step, ToolCommand)> {
        let tool = self.tool();
        let parent = match tool {
            ActivationTool::NetworkManager => policy.parent.as_deref(),
            ActivationTool::Initscripts => None,
        };

        let mut steps = Vec::new();
        match policy.ensure {
            Some(Ensure::Up) => {
                if policy.flush {
                    steps.push((Step::Flush, tool.flush_command(device)));
                }
                steps.push((Step::Up, tool.up_command(name, parent.unwrap_or(device))));
            }
            // Disconnecting the parent would take its own addresses down too.
            Some(Ensure::Down) if parent.is_some() => {
                debug!(interface = %name, parent, "alias left on its parent connection");
            }
            Some(Ensure::Down) => steps.push((Step::Down, tool.down_command(name, device))),
            None => {}
        }
        steps
    }

    async fn exec(&self, result: &mut ApplyResult, step: Step, cmd: ToolCommand) -> Result<()> {
        info!(interface = %result.name, step = step.as_str(), command = %cmd, "running");
        let out = self.runner.run(&cmd).await?;
        result.actions.push(Action::Run {
            step,
            command: cmd.clone(),
        });
        if !out.is_success() {
            return Err(Error::Activation {
                name: result.name.clone(),
                action: step.as_str().to_string(),
                command: cmd.to_string(),
                status: out.status,
                output: out.diagnostic().to_string(),
            });
        }
        Ok(())
    }

    /// Delete connections named after this interface that do not load from
    /// the managed file. Only this interface's connections are considered.
    async fn cleanup(&self, result: &mut ApplyResult, path: &Path) {
        let tool = self.tool();
        let Some(list) = tool.list_connections_command() else {
            return;
        };

        let name = result.name.clone();
        let out = match self.runner.run(&list).await {
            Ok(out) if out.is_success() => out,
            Ok(out) => {
                let e = Error::Cleanup {
                    name: name.clone(),
                    message: format!("`{}` failed: {}", list, out.diagnostic()),
                };
                warn!(interface = %name, error = %e, "cleanup failed");
                result.cleanup_errors.push(e);
                return;
            }
            Err(e) => {
                warn!(interface = %name, error = %e, "cleanup failed");
                result.cleanup_errors.push(Error::Cleanup {
                    name: name.clone(),
                    message: e.to_string(),
                });
                return;
            }
        };
        result.actions.push(Action::Run {
            step: Step::ListConnections,
            command: list,
        });

        let managed = path.to_string_lossy();
        let system_name = format!("System {}", name);
        let stale = parse_connections(&out.stdout)
            .into_iter()
            .filter(|c| (c.name == name || c.name == system_name) && c.filename != managed);

        for conn in stale {
            let cmd = tool.delete_connection_command(&conn.uuid);
            info!(interface = %name, uuid = %conn.uuid, file = %conn.filename, "deleting stale connection");
            match self.runner.run(&cmd).await {
                Ok(out) if out.is_success() => {
                    result.actions.push(Action::Run {
                        step: Step::DeleteConnection,
                        command: cmd,
                    });
                    result.removed_connections.push(conn.uuid);
                }
                Ok(out) => {
                    let e = Error::Cleanup {
                        name: name.clone(),
                        message: format!("`{}` failed: {}", cmd, out.diagnostic()),
                    };
                    warn!(interface = %name, error = %e, "cleanup failed");
                    result.cleanup_errors.push(e);
                }
                Err(e) => {
                    warn!(interface = %name, error = %e, "cleanup failed");
                    result.cleanup_errors.push(Error::Cleanup {
                        name: name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::file(path, e)),
    }
}

async fn write_marker(marker: &Path) -> Result<()> {
    if let Some(dir) = marker.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::file(dir, e))?;
    }
    tokio::fs::write(marker, b"")
        .await
        .map_err(|e| Error::file(marker, e))
}

/// Replace `path` with `content` through a temp file in the same directory.
async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let path = path.to_path_buf();
    let content = content.to_string();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &content))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

fn write_atomic_blocking(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| Error::file(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::file(dir, e))?;
    tmp.write_all(content.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .and_then(|()| {
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(FILE_MODE))
        })
        .map_err(|e| Error::file(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| Error::file(path, e.error))?;
    Ok(())
}
