use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use proofdeck_cli::commands::{self, Cli};
use proofdeck_cli::config::CliConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proofdeck=info,proofdeck_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!(error = %format!("{e:#}"), "Command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // --- Configuration ---
    let config = CliConfig::from_env()?;
    tracing::debug!(data_file = %config.data_file.display(), "Loaded CLI configuration");

    let output = commands::run(cli, &config).await?;
    println!("{output}");
    Ok(())
}
