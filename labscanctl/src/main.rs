mod cli;
mod commands;
mod render;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Scan summaries stay visible, per-item chatter does not. Override via RUST_LOG.
                "info,scan::item=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if env_loaded {
        debug!("loaded .env file");
    }

    let cli = Cli::parse();
    commands::run(cli).await
}
