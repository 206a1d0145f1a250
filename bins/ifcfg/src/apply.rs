//! Apply command - converge interface files and activate them.

use clap::Args;
use ifcfg::config::ApplyOptions;
use ifcfg::host::SystemHost;

use crate::manifest::{ManifestArgs, SettingsArgs};

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Show what would be done without doing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Keep going when an interface fails
    #[arg(long)]
    pub continue_on_error: bool,

    /// Only write files, don't reload or bring interfaces up/down
    #[arg(long)]
    pub no_activate: bool,
}

pub async fn run(args: ApplyArgs) -> anyhow::Result<()> {
    let mut config = args.manifest.load()?;
    args.settings.apply_to(&mut config);

    let host = SystemHost::system(config.settings().clone());
    let options = ApplyOptions {
        dry_run: args.dry_run,
        continue_on_error: args.continue_on_error,
        activate: !args.no_activate,
    };
    let result = config.apply_with_options(&host, options).await?;

    if args.dry_run {
        for outcome in &result.results {
            for action in &outcome.actions {
                println!("{}: would {}", outcome.name, action);
            }
        }
    }
    println!("{}", result.summary_text());

    if !result.is_success() {
        anyhow::bail!("{} interface(s) failed", result.failure_count());
    }
    Ok(())
}
