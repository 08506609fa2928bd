//! Configuration management for the health risk pipeline

use crate::models::selection::SelectionMetric;
use crate::models::{BoostingParams, ForestParams};
use anyhow::{ensure, Context, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable overriding the listen port
pub const PORT_ENV_VAR: &str = "ML_PORT";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub training: TrainingConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Attach a permissive CORS layer
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
            cors: true,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Locations of persisted model artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory holding every artifact
    pub dir: PathBuf,
    pub bagging_model: String,
    pub boosting_model: String,
    /// Model loaded by the prediction service
    pub best_model: String,
    pub scaler: String,
    /// JSON training summary
    pub report: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            bagging_model: "diabetes_risk_model_rf.bin".to_string(),
            boosting_model: "diabetes_risk_model_gb.bin".to_string(),
            best_model: "diabetes_risk_model.bin".to_string(),
            scaler: "scaler.bin".to_string(),
            report: "training_report.json".to_string(),
        }
    }
}

impl ArtifactsConfig {
    /// Artifacts rooted at `dir` with the default file names
    pub fn in_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn bagging_path(&self) -> PathBuf {
        self.dir.join(&self.bagging_model)
    }

    pub fn boosting_path(&self) -> PathBuf {
        self.dir.join(&self.boosting_model)
    }

    pub fn best_model_path(&self) -> PathBuf {
        self.dir.join(&self.best_model)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(&self.scaler)
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(&self.report)
    }
}

/// Offline training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// CSV dataset; synthesized here when absent
    pub dataset: PathBuf,
    /// Seed for the split, synthetic data and cross-validation
    pub seed: u64,
    /// Held-out share of rows
    pub test_fraction: f64,
    pub synthetic_samples: usize,
    /// Folds for cross-validated ROC-AUC (0 or 1 disables)
    pub cv_folds: usize,
    pub selection_metric: SelectionMetric,
    pub forest: ForestParams,
    pub boosting: BoostingParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("medical_data.csv"),
            seed: 42,
            test_fraction: 0.2,
            synthetic_samples: 2000,
            cv_folds: 5,
            selection_metric: SelectionMetric::Accuracy,
            forest: ForestParams::default(),
            boosting: BoostingParams::default(),
        }
    }
}

/// Request metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between periodic summaries (0 disables)
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 60,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level for this crate (trace, debug, info, warn, error)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The named file was missing
    Defaults(PathBuf),
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!(path = %path.display(), "Configuration loaded"),
            ConfigSource::Defaults(path) => {
                warn!(path = %path.display(), "Config file not found, using defaults")
            }
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path, then apply `ML_PORT`
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let mut app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app.apply_port_override(std::env::var(PORT_ENV_VAR).ok().as_deref())?;
        app.validate()?;
        Ok(app)
    }

    /// Like [`AppConfig::load_from_path`] but a missing file yields defaults.
    ///
    /// Nothing is logged here since tracing is usually not initialized yet;
    /// call [`ConfigSource::log`] once it is.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<(Self, ConfigSource)> {
        let path = path.as_ref();
        if path.exists() {
            let app = Self::load_from_path(path)?;
            return Ok((app, ConfigSource::File(path.to_path_buf())));
        }

        let mut app = AppConfig::default();
        app.apply_port_override(std::env::var(PORT_ENV_VAR).ok().as_deref())?;
        app.validate()?;
        Ok((app, ConfigSource::Defaults(path.to_path_buf())))
    }

    /// Replace the listen port with a raw override value when present
    pub fn apply_port_override(&mut self, raw: Option<&str>) -> Result<()> {
        if let Some(raw) = raw {
            self.server.port = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value: {:?}", PORT_ENV_VAR, raw))?;
        }
        Ok(())
    }

    /// Reject configurations no component can run with
    pub fn validate(&self) -> Result<()> {
        ensure!(self.server.port != 0, "server.port must be non-zero");
        ensure!(
            self.training.test_fraction > 0.0 && self.training.test_fraction < 1.0,
            "training.test_fraction must be in (0, 1), got {}",
            self.training.test_fraction
        );
        ensure!(
            self.training.synthetic_samples >= 10,
            "training.synthetic_samples must be at least 10"
        );
        ensure!(
            self.training.forest.n_estimators > 0,
            "training.forest.n_estimators must be at least 1"
        );
        ensure!(
            self.training.boosting.n_estimators > 0,
            "training.boosting.n_estimators must be at least 1"
        );
        ensure!(
            self.training.boosting.learning_rate > 0.0,
            "training.boosting.learning_rate must be positive"
        );
        ensure!(
            !self.artifacts.best_model.is_empty() && !self.artifacts.scaler.is_empty(),
            "artifact file names must not be empty"
        );
        Ok(())
    }
}
