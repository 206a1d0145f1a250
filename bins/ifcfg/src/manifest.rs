//! Manifest loading and settings overrides shared by the subcommands.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use ifcfg::config::NetworkConfig;
use ifcfg::runner::ActivationTool;

#[derive(Args)]
pub struct ManifestArgs {
    /// Manifest file (YAML, or JSON with a .json extension)
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,
}

impl ManifestArgs {
    pub fn load(&self) -> anyhow::Result<NetworkConfig> {
        NetworkConfig::from_path(&self.file)
            .with_context(|| format!("failed to load {}", self.file.display()))
    }
}

/// Overrides for the manifest's `settings` section.
#[derive(Args, Default)]
pub struct SettingsArgs {
    /// Directory holding ifcfg-* files
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Directory for pending-activation markers
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Activation tool (network-manager, initscripts)
    #[arg(long)]
    pub tool: Option<ActivationTool>,

    /// Timeout for each external command, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Don't delete stale connections
    #[arg(long)]
    pub no_cleanup: bool,

    /// Don't reload changed files before activation
    #[arg(long)]
    pub no_reload: bool,
}

impl SettingsArgs {
    pub fn apply_to(&self, config: &mut NetworkConfig) {
        let settings = config.settings_mut();
        if let Some(dir) = &self.config_dir {
            settings.config_dir = dir.clone();
        }
        if let Some(dir) = &self.state_dir {
            settings.state_dir = dir.clone();
        }
        if let Some(tool) = self.tool {
            settings.tool = tool;
        }
        if let Some(secs) = self.timeout {
            settings.command_timeout_secs = secs;
        }
        if self.no_cleanup {
            settings.cleanup = false;
        }
        if self.no_reload {
            settings.reload = false;
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl OutputFormat {
    pub fn serialize(self, config: &NetworkConfig) -> ifcfg::Result<String> {
        match self {
            Self::Yaml => config.to_yaml_string(),
            Self::Json => config.to_json_string(),
        }
    }
}
