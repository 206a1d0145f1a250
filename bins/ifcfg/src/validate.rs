//! Validate command - check a manifest.

use clap::Args;
use ifcfg::validation::Validatable;

use crate::manifest::ManifestArgs;

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,
}

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let config = args.manifest.load()?;
    let result = config.validate();

    for issue in result.all_issues() {
        if issue.is_warning() {
            eprintln!("{}", issue);
        } else {
            println!("{}", issue);
        }
    }

    if !result.is_valid() {
        anyhow::bail!("{} validation error(s)", result.errors.len());
    }
    println!(
        "{} interface(s) valid, {} warning(s)",
        config.interfaces().len(),
        result.warnings.len()
    );
    Ok(())
}
