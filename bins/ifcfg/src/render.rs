//! Render command - print interface files.

use clap::Args;
use ifcfg::host::SystemHost;

use crate::manifest::{ManifestArgs, SettingsArgs};

#[derive(Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Render only this interface
    #[arg(short, long)]
    pub interface: Option<String>,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let mut config = args.manifest.load()?;
    args.settings.apply_to(&mut config);

    if let Some(name) = &args.interface
        && config.get(name).is_none()
    {
        anyhow::bail!("interface {} is not in the manifest", name);
    }

    let host = SystemHost::system(config.settings().clone());
    let rendered = config.render(&host)?;
    let selected = rendered
        .iter()
        .filter(|r| args.interface.as_deref().is_none_or(|name| r.name() == name));

    for (i, file) in selected.enumerate() {
        if i > 0 {
            println!();
        }
        if args.interface.is_none() {
            println!("==> {} <==", config.settings().ifcfg_path(file.name()).display());
        }
        print!("{}", file);
    }
    Ok(())
}
