//! Deadlock Bank - transfer gateway
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│  Store   │───▶│  Engine  │───▶│ Gateway  │
//! │  (YAML)  │    │(row lock)│    │(strategy)│    │  (HTTP)  │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```

use std::sync::Arc;

use clap::Parser;

use deadlock_bank::app;
use deadlock_bank::config::{AppConfig, StoreBackend};
use deadlock_bank::gateway::{self, state::AppState};
use deadlock_bank::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "deadlock_bank", version, about = "Concurrent transfer gateway")]
struct Cli {
    /// Config environment: loads config/<ENV>.yaml
    #[arg(short, long, default_value = "dev")]
    env: String,

    /// Override gateway.port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override store.backend (memory | postgres)
    #[arg(long)]
    store: Option<StoreBackend>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.env)?;
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(backend) = cli.store {
        config.store.backend = backend;
    }

    let _log_guard = init_logging(&config)?;
    tracing::info!(env = %cli.env, backend = ?config.store.backend, "Starting Deadlock Bank");

    let engine = app::build_engine(&config).await?;
    let state = Arc::new(AppState::new(engine));

    gateway::run_server(&config.gateway.host, config.gateway.port, state).await?;

    tracing::info!("Gateway stopped");
    Ok(())
}
