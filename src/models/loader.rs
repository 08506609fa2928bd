//! Model and scaler artifact persistence

use crate::config::ArtifactsConfig;
use crate::error::ArtifactError;
use crate::feature_extractor::{FeatureExtractor, FEATURE_COUNT};
use crate::models::{ModelKind, RiskClassifier, TrainedModel};
use crate::scaler::StandardScaler;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bumped whenever the persisted layout changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Provenance stored alongside a classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub kind: ModelKind,
    pub trained_at: DateTime<Utc>,
    pub test_accuracy: f64,
    pub roc_auc: f64,
    /// Feature names in model order
    pub feature_names: Vec<String>,
}

/// Persisted classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub metadata: ModelMetadata,
    pub model: TrainedModel,
}

impl ModelArtifact {
    pub fn new(model: TrainedModel, test_accuracy: f64, roc_auc: f64) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            metadata: ModelMetadata {
                kind: model.kind(),
                trained_at: Utc::now(),
                test_accuracy,
                roc_auc,
                feature_names: schema_names(),
            },
            model,
        }
    }

    /// Checks a decoded artifact can serve predictions
    pub fn validate(&self) -> Result<(), ArtifactError> {
        check_version(self.format_version)?;
        check_schema(&self.metadata.feature_names)?;

        if self.metadata.kind != self.model.kind() {
            return Err(ArtifactError::Invalid(format!(
                "metadata says {} but model is {}",
                self.metadata.kind,
                self.model.kind()
            )));
        }
        if !self.model.is_fitted() || !self.model.is_well_formed() {
            return Err(ArtifactError::Invalid(
                "classifier is not fitted or is malformed".to_string(),
            ));
        }

        let importance = self.model.feature_importance().ok_or_else(|| {
            ArtifactError::Invalid("classifier does not report feature importance".to_string())
        })?;
        let sum: f64 = importance.iter().sum();
        if importance.iter().any(|v| !(*v >= 0.0)) || (sum - 1.0).abs() > 1e-6 {
            return Err(ArtifactError::Invalid(format!(
                "feature importance must be non-negative and sum to 1, got sum {:.6}",
                sum
            )));
        }
        Ok(())
    }
}

/// Persisted scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub format_version: u32,
    pub fitted_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
}

impl ScalerArtifact {
    pub fn new(scaler: StandardScaler) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            fitted_at: Utc::now(),
            feature_names: schema_names(),
            scaler,
        }
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        check_version(self.format_version)?;
        check_schema(&self.feature_names)?;
        self.scaler.validate()
    }
}

fn schema_names() -> Vec<String> {
    FeatureExtractor::new()
        .feature_names()
        .into_iter()
        .map(String::from)
        .collect()
}

fn check_version(found: u32) -> Result<(), ArtifactError> {
    if found != ARTIFACT_FORMAT_VERSION {
        return Err(ArtifactError::Version {
            found,
            expected: ARTIFACT_FORMAT_VERSION,
        });
    }
    Ok(())
}

fn check_schema(names: &[String]) -> Result<(), ArtifactError> {
    if names.len() != FEATURE_COUNT || names != schema_names().as_slice() {
        return Err(ArtifactError::Invalid(format!(
            "feature schema mismatch: {:?}",
            names
        )));
    }
    Ok(())
}

/// Reads and writes the artifacts named in [`ArtifactsConfig`]
#[derive(Debug, Clone)]
pub struct ModelLoader {
    artifacts: ArtifactsConfig,
}

impl ModelLoader {
    pub fn new(artifacts: ArtifactsConfig) -> Self {
        Self { artifacts }
    }

    pub fn artifacts(&self) -> &ArtifactsConfig {
        &self.artifacts
    }

    /// Path of the classifier artifact for one variant
    pub fn candidate_path(&self, kind: ModelKind) -> PathBuf {
        match kind {
            ModelKind::Bagging => self.artifacts.bagging_path(),
            ModelKind::Boosting => self.artifacts.boosting_path(),
        }
    }

    /// Load the model the prediction service serves
    pub fn load_best_model(&self) -> Result<ModelArtifact, ArtifactError> {
        self.load_model(self.artifacts.best_model_path())
    }

    /// Load and validate a classifier artifact
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<ModelArtifact, ArtifactError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading model artifact");

        let artifact: ModelArtifact = read_artifact(path)?;
        artifact.validate()?;

        info!(
            model = %artifact.metadata.kind,
            trained_at = %artifact.metadata.trained_at,
            test_accuracy = artifact.metadata.test_accuracy,
            "Model loaded successfully"
        );
        Ok(artifact)
    }

    /// Load and validate the scaler artifact
    pub fn load_scaler(&self) -> Result<ScalerArtifact, ArtifactError> {
        let path = self.artifacts.scaler_path();
        info!(path = %path.display(), "Loading scaler artifact");

        let artifact: ScalerArtifact = read_artifact(&path)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn save_model<P: AsRef<Path>>(
        &self,
        path: P,
        artifact: &ModelArtifact,
    ) -> Result<(), ArtifactError> {
        write_artifact(path.as_ref(), artifact)?;
        info!(
            model = %artifact.metadata.kind,
            path = %path.as_ref().display(),
            "Model artifact saved"
        );
        Ok(())
    }

    pub fn save_scaler(&self, artifact: &ScalerArtifact) -> Result<(), ArtifactError> {
        let path = self.artifacts.scaler_path();
        write_artifact(&path, artifact)?;
        info!(path = %path.display(), "Scaler artifact saved");
        Ok(())
    }
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::NotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|source| ArtifactError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes through a sibling temp file so readers never see a partial artifact
fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let io_err = |source: std::io::Error| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let bytes = bincode::serialize(value)?;
    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp).map_err(io_err)?);
        writer.write_all(&bytes).map_err(io_err)?;
        writer.flush().map_err(io_err)?;
    }
    fs::rename(&tmp, path).map_err(io_err)?;

    debug!(path = %path.display(), bytes = bytes.len(), "Artifact written");
    Ok(())
}
