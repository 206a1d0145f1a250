//! Capture command - read existing ifcfg files into a manifest.

use std::path::PathBuf;

use clap::Args;
use ifcfg::config::DEFAULT_CONFIG_DIR;
use ifcfg::config::capture::capture_dir;

use crate::manifest::OutputFormat;

#[derive(Args)]
pub struct CaptureArgs {
    /// Directory holding ifcfg-* files
    #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// Capture only this interface (repeatable)
    #[arg(short, long)]
    pub interface: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "yaml")]
    pub format: OutputFormat,
}

pub fn run(args: CaptureArgs) -> anyhow::Result<()> {
    let config = capture_dir(&args.config_dir, &args.interface)?;
    print!("{}", args.format.serialize(&config)?);
    Ok(())
}
