//! bwsync CLI entry point.

use anyhow::Result;
use clap::Parser;

use bwsync::cli::{commands, Cli, Commands};
use bwsync::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("bwsync={}", log_level).parse().unwrap()),
        )
        .with_target(false)
        .init();

    let config = Config::load_default()?;

    match cli.command {
        Commands::Plan => commands::plan(&config),
        Commands::Apply { dry_run, yes } => commands::apply(&config, dry_run, yes),
        Commands::Status => commands::status(&config),
        Commands::Bw { profile, args } => {
            let code = commands::bw_passthrough(&config, profile, &args)?;
            std::process::exit(code);
        }
        Commands::Logout => commands::logout(&config),
    }
}
