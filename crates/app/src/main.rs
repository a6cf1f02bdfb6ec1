//! Draft server
//!
//! Runs the auction workers and one live-channel server per worker.

use std::path::PathBuf;

use clap::Parser;
use draft_engine::Cluster;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod network;
mod state;

/// Command-line arguments; each one overrides the config file
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Live player-draft auction server", long_about = None)]
pub struct Args {
    /// TOML config file
    #[arg(short, long, env = "DRAFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Port of worker 0; worker i listens on port + i
    #[arg(short, long)]
    pub port: Option<u16>,

    /// SQLite database file
    #[arg(long, env = "DRAFT_DATABASE")]
    pub database: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::info!("Starting draft server");

    let app_state = match state::AppState::new(&args) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to initialize server: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        database = %app_state.db_path.display(),
        workers = app_state.config.server.workers,
        "Configuration resolved"
    );
    let cluster = Cluster::start(app_state.storage(), &app_state.config);

    let servers = match network::start_servers(&cluster, &app_state.config.server).await {
        Ok(servers) => servers,
        Err(e) => {
            tracing::error!("Failed to start servers: {}", e);
            cluster.shutdown().await;
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    tracing::info!("Shutting down");
    network::stop_servers(&servers);
    cluster.shutdown().await;
}
