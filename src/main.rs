use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use deskpilot::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    cli::run(cli).await
}
