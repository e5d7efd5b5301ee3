//! Dockhand - Docker Management API
//!
//! CLI entry point for the dockhand server.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod middleware;
mod server;
mod websocket;

/// Dockhand server command line
#[derive(Debug, Parser)]
#[command(name = "dockhand", version, about = "Docker management API server")]
pub struct Cli {
    /// Bind address override
    #[arg(long)]
    pub host: Option<String>,

    /// Port override
    #[arg(long)]
    pub port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dockhand=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("Starting Dockhand v{}", env!("CARGO_PKG_VERSION"));

    server::run(cli).await
}
