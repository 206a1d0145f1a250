//! Diff command - preview changes.

use clap::Args;
use ifcfg::host::SystemHost;

use crate::manifest::{ManifestArgs, SettingsArgs};

#[derive(Args)]
pub struct DiffArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

pub async fn run(args: DiffArgs) -> anyhow::Result<()> {
    let mut config = args.manifest.load()?;
    args.settings.apply_to(&mut config);

    let host = SystemHost::system(config.settings().clone());
    let diff = config.diff(&host).await?;
    println!("{}", diff.summary());
    Ok(())
}
