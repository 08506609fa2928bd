//! Health Risk Pipeline Library
//!
//! Scores binary health risk (diabetes) from eight patient attributes.
//! An offline pipeline trains a random forest and a gradient-boosted
//! ensemble, keeps the better one, and an HTTP service serves it.

pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod scaler;
pub mod server;
pub mod service;
pub mod training;
pub mod types;

pub use crate::config::AppConfig;
pub use error::{ArtifactError, CodecError, ModelError, PredictError, TrainingError};
pub use feature_extractor::{FeatureExtractor, FeatureVector, FEATURE_COUNT};
pub use models::inference::InferenceEngine;
pub use models::{ModelKind, RiskClassifier, TrainedModel};
pub use scaler::StandardScaler;
pub use service::PredictionService;
pub use training::{TrainingPipeline, TrainingReport};
pub use types::{PatientRecord, PredictionResponse};

use crate::config::{LogFormat, LoggingConfig};
use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Filter directives enabling `level` for this library and the calling binary
pub fn log_directives(level: &str, binary: &str) -> String {
    format!("health_risk_pipeline={level},{binary}={level}")
}

/// Initialize the global tracing subscriber.
///
/// When `RUST_LOG` is set it is used as is; otherwise this library and
/// `binary` (pass `env!("CARGO_CRATE_NAME")`) log at `logging.level`.
pub fn init_tracing(logging: &LoggingConfig, binary: &str) -> Result<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(_) => EnvFilter::try_from_default_env()?,
        Err(_) => EnvFilter::try_new(log_directives(&logging.level, binary))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let initialized = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    initialized.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}
