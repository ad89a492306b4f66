//! Snapworth Rate Service Binary
//!
//! Serves exchange rates over HTTP or runs one cache refresh and exits.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snapworth_fx::{MemoryRateStore, RateStore};
use snapworth_rates_server::{router, scheduler, AppState, PgRateStore, ServerConfig};

/// Snapworth exchange rate service
#[derive(Parser, Debug)]
#[command(name = "rates-server")]
#[command(about = "Multi-source exchange rate service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Refresh the cached basket once and exit
    Refresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = ServerConfig::from_env();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let store = open_store(&config).await?;
    let state = AppState::from_config(&config, store)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, state).await,
        Command::Refresh => {
            let report = state.refresh.run().await?;
            info!(
                updated = report.updated.len(),
                failed = report.failed.len(),
                "Refresh finished"
            );
            Ok(())
        }
    }
}

async fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn RateStore>> {
    match &config.database_url {
        Some(url) => {
            let store = PgRateStore::connect(url).await?;
            store.ensure_schema().await?;
            info!("Using PostgreSQL rate store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, caching rates in memory");
            Ok(Arc::new(MemoryRateStore::new()))
        }
    }
}

async fn serve(config: ServerConfig, state: AppState) -> anyhow::Result<()> {
    info!(
        environment = ?config.environment,
        fallback = ?config.fallback_policy(),
        "Starting Snapworth rate service"
    );

    let refresh_loop = scheduler::spawn_refresh_loop(state.refresh.clone(), config.refresh_interval);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %config.bind_addr(), "Rate service listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await?;

    if let Some(handle) = refresh_loop {
        handle.abort();
    }

    info!("Rate service shutdown complete");
    Ok(())
}
