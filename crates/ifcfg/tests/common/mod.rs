//! Common test utilities for integration tests.
//!
//! Provides a scripted command runner that records every command, a
//! package ensurer that records every request, and `TestHost`, a host whose
//! directories live in a temporary directory.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ifcfg::config::Settings;
use ifcfg::facts::StaticFacts;
use ifcfg::host::Host;
use ifcfg::package::PackageEnsurer;
use ifcfg::runner::{CommandOutput, CommandRunner, ToolCommand};
use ifcfg::util::MacAddr;
use ifcfg::{Error, Result};

/// How the runner answers a command whose text starts with a prefix.
#[derive(Debug, Clone)]
pub enum Reply {
    Output(CommandOutput),
    Timeout,
}

/// Records commands and answers them from a script.
///
/// Unscripted commands succeed with empty output.
#[derive(Debug, Clone, Default)]
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<String>>>,
    script: Arc<Mutex<Vec<(String, Reply)>>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix`. Later rules win.
    pub fn reply(&self, prefix: &str, reply: Reply) {
        self.script
            .lock()
            .unwrap()
            .push((prefix.to_string(), reply));
    }

    /// Make commands starting with `prefix` exit non-zero.
    pub fn fail(&self, prefix: &str, status: i32, stderr: &str) {
        self.reply(prefix, Reply::Output(CommandOutput::failure(status, stderr)));
    }

    /// Make commands starting with `prefix` print `stdout`.
    pub fn answer(&self, prefix: &str, stdout: &str) {
        self.reply(prefix, Reply::Output(CommandOutput::success(stdout)));
    }

    /// Remove every scripted rule.
    pub fn reset_script(&self) {
        self.script.lock().unwrap().clear();
    }

    /// Commands run so far, as text.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Forget the recorded commands.
    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, cmd: &ToolCommand) -> Result<CommandOutput> {
        let text = cmd.to_string();
        self.calls.lock().unwrap().push(text.clone());

        let reply = self
            .script
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(prefix, _)| text.starts_with(prefix.as_str()))
            .map(|(_, reply)| reply.clone());

        match reply {
            None => Ok(CommandOutput::success("")),
            Some(Reply::Output(out)) => Ok(out),
            Some(Reply::Timeout) => Err(Error::Timeout {
                command: text,
                timeout: Duration::from_secs(30),
            }),
        }
    }
}

/// Records requested packages; optionally fails them.
#[derive(Debug, Clone, Default)]
pub struct RecordingPackages {
    requested: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingPackages {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl PackageEnsurer for RecordingPackages {
    async fn ensure(&self, package: &str) -> Result<bool> {
        self.requested.lock().unwrap().push(package.to_string());
        if self.fail {
            return Err(Error::Package {
                package: package.to_string(),
                status: Some(1),
                output: "No package available.".to_string(),
            });
        }
        Ok(true)
    }
}

pub type TestHostInner = Host<RecordingRunner, StaticFacts, RecordingPackages>;

/// A host rooted in a temporary directory.
pub struct TestHost {
    pub host: TestHostInner,
    pub runner: RecordingRunner,
    pub packages: RecordingPackages,
    _dir: tempfile::TempDir,
}

impl TestHost {
    pub fn new() -> Self {
        Self::with(|s| s, RecordingPackages::default())
    }

    pub fn with_settings(f: impl FnOnce(Settings) -> Settings) -> Self {
        Self::with(f, RecordingPackages::default())
    }

    pub fn with(f: impl FnOnce(Settings) -> Settings, packages: RecordingPackages) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings {
            config_dir: dir.path().join("network-scripts"),
            state_dir: dir.path().join("run"),
            sysfs_root: dir.path().join("sys"),
            ..Settings::default()
        };
        let settings = f(settings);

        let facts = StaticFacts::new().with_mac(
            "eth0",
            "52:54:00:12:34:56".parse::<MacAddr>().expect("mac"),
        );
        let runner = RecordingRunner::new();
        let host = Host::new(settings, runner.clone(), facts, packages.clone());

        Self {
            host,
            runner,
            packages,
            _dir: dir,
        }
    }

    pub fn ifcfg_path(&self, name: &str) -> PathBuf {
        self.host.settings().ifcfg_path(name)
    }

    pub fn pending_path(&self, name: &str) -> PathBuf {
        self.host.settings().pending_path(name)
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.ifcfg_path(name)).expect("read ifcfg file")
    }

    pub fn exists(&self, name: &str) -> bool {
        self.ifcfg_path(name).exists()
    }
}

/// Make `dir` read-only. Returns false when the current user ignores
/// directory permissions (root), in which case the caller should skip.
pub fn make_read_only(dir: &Path) -> bool {
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o555)).expect("chmod dir");
    let check = dir.join(".write-check");
    match std::fs::File::create(&check) {
        Ok(_) => {
            let _ = std::fs::remove_file(&check);
            restore_writable(dir);
            false
        }
        Err(_) => true,
    }
}

/// Undo [`make_read_only`] so the temp directory can be removed.
pub fn restore_writable(dir: &Path) {
    let _ = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755));
}
