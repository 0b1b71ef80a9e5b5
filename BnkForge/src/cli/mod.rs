//! BnkForge CLI - Command-line interface for SoundBank patching and size-matched encoding

pub mod commands;
pub mod progress;

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use tracing_subscriber::EnvFilter;

use crate::config::ForgeConfig;

#[derive(Parser)]
#[command(name = "bnkforge", version)]
#[command(about = "BnkForge: Wwise SoundBank patching and size-matched WEM encoding", long_about = None)]
struct Cli {
    /// Config file (defaults to bnkforge.toml in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Run the BnkForge CLI
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ForgeConfig::load_or_default(cli.config.as_deref())?;
    cli.command.execute(&config)?;

    Ok(())
}

/// `-v` flags win over `RUST_LOG`; without either, only warnings are shown
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
