//! minefleet daemon
//!
//! Drives every configured mining appliance through its provisioning
//! lifecycle, polls the fleet for telemetry and serves snapshots and
//! operator controls over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use eyre::WrapErr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod factory;
mod router;
mod state;

use config::{Config, DaemonConfig, LogFormat};
use factory::DefaultDeviceFactory;
use state::App;

#[derive(Parser)]
#[command(name = "minefleet")]
#[command(about = "Fleet manager for mining appliances", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing(daemon: &DaemonConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&daemon.log_level));

    match daemon.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let (config, source) = Config::resolve(cli.config.as_deref())?;
    init_tracing(&config.daemon);

    match &source {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => warn!("no configuration file found, using defaults"),
    }
    if config.miner.is_empty() {
        warn!("no miners configured");
    }

    let bind = config.daemon.bind.clone();
    let app = App::build(config, Arc::new(DefaultDeviceFactory::new())).await?;
    let state = app.state();
    let poller = app.start().await?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .wrap_err_with(|| format!("failed to bind {bind}"))?;
    info!("minefleet listening on {bind}");

    let running = state.running.clone();
    axum::serve(listener, router::create_router(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            info!("shutting down");
            running.stop();
        })
        .await?;

    poller.await?;
    Ok(())
}
