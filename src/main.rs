use anyhow::Context;
use clap::Parser;
use rentsync::cli::{check, simulate, Cli, Commands};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check(arg) => {
            check::execute(arg.config.as_deref()).context("configuration check failed")?;
        }
        Commands::Simulate(args) => {
            let config = check::load(args.config.as_deref()).context("failed to load config")?;
            config.init_logging();
            info!(failures = args.failures, "rentsync simulation starting");
            simulate::execute(&config, args.failures, args.json)
                .await
                .context("simulation failed")?;
        }
    }
    Ok(())
}
