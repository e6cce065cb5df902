//! avgraph CLI - drive filter stages from the command line.

mod commands;
mod synth;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "avgraph")]
#[command(author, version, about = "avgraph filter stage CLI", long_about = None)]
struct Cli {
    /// Raise the log level (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push synthetic media through a stage and report what comes out
    Run(commands::run::RunArgs),

    /// Build a stage from a config and report its graph state
    Check(commands::check::CheckArgs),

    /// List pixel and sample formats with their flow definitions
    Formats(commands::formats::FormatsArgs),

    /// List the filters of the reference engine
    Filters,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Formats(args) => commands::formats::run(args),
        Commands::Filters => commands::filters::run(),
    }
}
