//! External command execution.
//!
//! Every side effect outside the file system goes through a
//! [`CommandRunner`]. [`SystemRunner`] spawns real processes under a
//! timeout; tests substitute a scripted runner.

use std::fmt;
use std::future::Future;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    /// Create a command without arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Get the program.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful run with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code and stderr.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Check if the command exited zero.
    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }

    /// Text worth showing on failure: stderr, or stdout when stderr is empty.
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Runs external commands.
pub trait CommandRunner {
    /// Run a command to completion.
    ///
    /// A non-zero exit is not an error at this level; it is reported in
    /// [`CommandOutput::status`]. Errors are spawn failures and timeouts.
    fn run(&self, cmd: &ToolCommand) -> impl Future<Output = Result<CommandOutput>> + Send;
}

impl<T: CommandRunner + Sync + ?Sized> CommandRunner for &T {
    fn run(&self, cmd: &ToolCommand) -> impl Future<Output = Result<CommandOutput>> + Send {
        (**self).run(cmd)
    }
}

impl<T: CommandRunner + Send + Sync + ?Sized> CommandRunner for Arc<T> {
    fn run(&self, cmd: &ToolCommand) -> impl Future<Output = Result<CommandOutput>> + Send {
        (**self).run(cmd)
    }
}

/// Runs commands as child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    /// Create a runner that kills commands after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Get the timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, cmd: &ToolCommand) -> Result<CommandOutput> {
        debug!(command = %cmd, "running");

        let child = tokio::process::Command::new(cmd.program())
            .args(cmd.get_args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(result) => result.map_err(|e| Error::file(cmd.program(), e))?,
            Err(_) => {
                return Err(Error::Timeout {
                    command: cmd.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        let result = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(command = %cmd, status = ?result.status, "finished");
        Ok(result)
    }
}

// ============================================================================
// Activation tools
// ============================================================================

/// Tool used to load and activate connection definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivationTool {
    /// NetworkManager through `nmcli`.
    #[default]
    NetworkManager,
    /// Legacy `ifup`/`ifdown` scripts.
    Initscripts,
}

impl ActivationTool {
    /// Get the manifest name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkManager => "network-manager",
            Self::Initscripts => "initscripts",
        }
    }

    /// Command that loads a changed file, if the tool needs one.
    pub fn reload_command(&self, path: &str) -> Option<ToolCommand> {
        match self {
            Self::NetworkManager => Some(ToolCommand::new("nmcli").args(["connection", "load", path])),
            Self::Initscripts => None,
        }
    }

    /// Command that brings the interface up.
    pub fn up_command(&self, name: &str, device: &str) -> ToolCommand {
        match self {
            Self::NetworkManager => {
                ToolCommand::new("nmcli").args(["connection", "up", "ifname", device])
            }
            Self::Initscripts => ToolCommand::new("ifup").arg(name),
        }
    }

    /// Command that brings the interface down.
    pub fn down_command(&self, name: &str, device: &str) -> ToolCommand {
        match self {
            Self::NetworkManager => ToolCommand::new("nmcli").args(["device", "disconnect", device]),
            Self::Initscripts => ToolCommand::new("ifdown").arg(name),
        }
    }

    /// Command that removes every address from the device.
    pub fn flush_command(&self, device: &str) -> ToolCommand {
        ToolCommand::new("ip").args(["addr", "flush", "dev", device])
    }

    /// Command listing known connections, if the tool keeps any.
    pub fn list_connections_command(&self) -> Option<ToolCommand> {
        match self {
            Self::NetworkManager => Some(ToolCommand::new("nmcli").args([
                "-t",
                "-f",
                "NAME,UUID,FILENAME",
                "connection",
                "show",
            ])),
            Self::Initscripts => None,
        }
    }

    /// Command deleting a connection by UUID.
    pub fn delete_connection_command(&self, uuid: &str) -> ToolCommand {
        ToolCommand::new("nmcli").args(["connection", "delete", "uuid", uuid])
    }
}

impl fmt::Display for ActivationTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivationTool {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "network-manager" | "networkmanager" | "nm" | "nmcli" => Ok(Self::NetworkManager),
            "initscripts" | "ifup" => Ok(Self::Initscripts),
            _ => Err(format!("unknown activation tool: {}", s)),
        }
    }
}

/// One row of `nmcli -t -f NAME,UUID,FILENAME connection show`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub name: String,
    pub uuid: String,
    pub filename: String,
}

/// Parse nmcli terse output. Fields are `:` separated, with literal `:`
/// and `\` escaped by a backslash.
pub fn parse_connections(stdout: &str) -> Vec<Connection> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut fields = split_terse(line).into_iter();
            Some(Connection {
                name: fields.next()?,
                uuid: fields.next()?,
                filename: fields.next().unwrap_or_default(),
            })
        })
        .collect()
}

fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}
