//! ifcfg - declarative ifcfg network-scripts management.
//!
//! Reads a YAML/JSON manifest of interfaces and converges
//! `/etc/sysconfig/network-scripts/ifcfg-*` to it.

mod apply;
mod capture;
mod diff;
mod example;
mod manifest;
mod render;
mod validate;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ifcfg", version, about = "Declarative ifcfg network-scripts management")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write changed interface files and activate them.
    Apply(apply::ApplyArgs),

    /// Show what apply would change.
    Diff(diff::DiffArgs),

    /// Print rendered interface files.
    Render(render::RenderArgs),

    /// Check a manifest without touching the host.
    Validate(validate::ValidateArgs),

    /// Read existing ifcfg files into a manifest.
    Capture(capture::CaptureArgs),

    /// Print an example manifest.
    Example(example::ExampleArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Apply(args) => apply::run(args).await,
        Command::Diff(args) => diff::run(args).await,
        Command::Render(args) => render::run(args),
        Command::Validate(args) => validate::run(args),
        Command::Capture(args) => capture::run(args),
        Command::Example(args) => example::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
