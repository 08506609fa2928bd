//! Offline Model Training
//!
//! Trains the random forest and gradient boosting candidates, keeps the
//! better one and writes every artifact the ML server loads at startup.

use anyhow::{Context, Result};
use health_risk_pipeline::{
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    init_tracing, TrainingPipeline,
};
use tracing::info;

fn main() -> Result<()> {
    let config_path =
        std::env::var("HEALTH_RISK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let (config, source) = AppConfig::load_or_default(&config_path)?;

    init_tracing(&config.logging, env!("CARGO_CRATE_NAME"))?;
    source.log();
    info!(
        config = %config_path,
        dataset = %config.training.dataset.display(),
        artifacts = %config.artifacts.dir.display(),
        "Starting model training"
    );

    let report = TrainingPipeline::new(&config)
        .run()
        .context("Training failed")?;
    report.log_summary();

    info!(
        model = %config.artifacts.best_model_path().display(),
        scaler = %config.artifacts.scaler_path().display(),
        "Artifacts ready"
    );
    Ok(())
}
