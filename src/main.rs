//! Health Risk Pipeline - ML Server Entry Point
//!
//! Loads the trained scaler and model once, then serves predictions over HTTP.
//! Starts without a model when artifacts are missing so health checks still work.

use anyhow::{Context, Result};
use health_risk_pipeline::{
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    init_tracing,
    metrics::MetricsReporter,
    server::{self, AppState},
    service::PredictionService,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("HEALTH_RISK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let (config, source) = AppConfig::load_or_default(&config_path)?;

    init_tracing(&config.logging, env!("CARGO_CRATE_NAME"))?;
    source.log();
    info!(config = %config_path, "Starting Health Risk ML Server");

    let service = PredictionService::start(&config);
    if !service.is_ready() {
        warn!("No model loaded; /api/predict will answer 500 until artifacts are trained");
    }
    let state = AppState::new(service);

    // Periodic metrics summary
    let reporter = MetricsReporter::new(state.metrics.clone(), config.metrics.report_interval_secs);
    tokio::spawn(reporter.start());

    let app = server::router(state.clone(), config.server.cors);
    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    server::serve(listener, app, shutdown_signal()).await?;

    info!("ML server shutting down...");
    state.metrics.print_summary();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
