//! Cardiorisk - Main Entry Point

use cardiorisk::cli::{cmd_info, cmd_predict, cmd_train, Cli, Commands};
use cardiorisk::PipelineContext;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardiorisk=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let ctx = PipelineContext::new(cli.pipeline_config()?)?;

    match &cli.command {
        Commands::Train => cmd_train(&ctx)?,
        Commands::Predict { input, output } => cmd_predict(&ctx, input, output.as_deref())?,
        Commands::Info => cmd_info(&ctx)?,
    }

    Ok(())
}
