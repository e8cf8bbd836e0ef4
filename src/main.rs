//! boostrun - Main Entry Point

use boostrun::cli::{cmd_params, cmd_predict, cmd_train, Cli, Commands};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boostrun=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => cmd_train(&args)?,
        Commands::Predict(args) => cmd_predict(&args)?,
        Commands::Params(args) => cmd_params(&args)?,
    }

    Ok(())
}
