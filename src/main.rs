//! gosv-log - guest OS validation run logging
//!
//! This is the main entry point for the gosv-log CLI.

mod cli;

use anyhow::Result;
use cli::commands::{show_config, CommandContext};
use cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbosity());

    if cli.verbosity() >= 2 {
        eprintln!("gosv-log v{} by {}", VERSION, AUTHORS);
    }

    let exit_code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            e.downcast_ref::<gosv_log::Error>()
                .map_or(1, gosv_log::Error::exit_code)
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: &Cli) -> Result<i32> {
    let mut ctx = CommandContext::new(cli)?;

    match &cli.command {
        Commands::Replay(args) => args.execute(&mut ctx).await,
        Commands::ShowConfig(args) => show_config(args.format, &ctx),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbosity >= 3).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}
