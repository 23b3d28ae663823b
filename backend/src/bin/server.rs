//! Forecast API HTTP Server Binary
//!
//! This is the main entry point for the forecast REST API server.
//! It resolves configuration, builds the repository, sets up the HTTP router
//! and starts serving requests.
//!
//! # Usage
//!
//! ```bash
//! # Query the warehouse
//! GOOGLE_CLOUD_PROJECT_ID=retail-analytics \
//! BIGQUERY_DATASET_ID=forecasting \
//! BIGQUERY_TABLE_ID=weekly_forecasts \
//!   cargo run --bin forecast-server
//!
//! # Serve an in-memory data set
//! REPOSITORY_TYPE=local LOCAL_DATA_PATH=fixtures/forecasts.json \
//!   cargo run --bin forecast-server
//!
//! # Read repository settings from a TOML file
//! FORECAST_CONFIG=forecast.toml cargo run --bin forecast-server
//! ```
//!
//! # Environment Variables
//!
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8000)
//! - `RUST_LOG`: Log filter (default: `debug` when `DEBUG=true`, else `info`)
//!
//! See [`forecast_api::config::AppConfig`] for the full list.

use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use forecast_api::config::{AppConfig, ServerSettings};
use forecast_api::db::RepositoryFactory;
use forecast_api::http::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging first so configuration warnings are reported.
    // An invalid DEBUG value is reported by the load below.
    let debug = ServerSettings::debug_from_env().unwrap_or(ServerSettings::default().debug);
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    info!(
        "Starting {} v{} ({})",
        config.server.app_name,
        config.server.app_version,
        config.server.environment()
    );

    let repository =
        RepositoryFactory::create(&config).context("Failed to initialize repository")?;
    info!("Repository initialized successfully");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid HOST/PORT")?;
    let prefix = config.server.api_prefix.clone();

    let state = AppState::new(repository, config.server);
    let app = create_router(state);

    info!("Server listening on http://{}", addr);
    info!("Forecast endpoints under http://{}{}/forecast/", addr, prefix);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
