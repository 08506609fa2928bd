//! Inference engine: scale, classify and assemble the prediction

use crate::config::ArtifactsConfig;
use crate::error::{ArtifactError, ModelError};
use crate::feature_extractor::{FeatureVector, FEATURES};
use crate::models::loader::{ModelLoader, ModelMetadata};
use crate::models::{label_from_probability, ModelKind, RiskClassifier, TrainedModel};
use crate::scaler::StandardScaler;
use crate::types::prediction::PredictionResponse;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Result of model inference
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Predicted label (1 = at risk)
    pub risk: u8,
    /// Probability of label 1
    pub probability: f64,
    /// max(p, 1 - p)
    pub confidence: f64,
    /// Global feature importance in feature order
    pub importance: FeatureVector,
}

impl PredictionResult {
    fn from_probability(probability: f64, importance: FeatureVector) -> Self {
        Self {
            risk: label_from_probability(probability),
            probability,
            confidence: probability.max(1.0 - probability),
            importance,
        }
    }

    /// Convert to the wire response, keyed by feature label
    pub fn to_response(&self) -> PredictionResponse {
        let feature_importance: BTreeMap<String, f64> = FEATURES
            .iter()
            .zip(self.importance.iter())
            .map(|(spec, &v)| (spec.label.to_string(), v))
            .collect();

        PredictionResponse {
            risk: self.risk,
            probability: self.probability,
            confidence: self.confidence,
            feature_importance,
        }
    }
}

/// Read-only scaler + classifier pair shared by every request
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    scaler: StandardScaler,
    model: TrainedModel,
    importance: FeatureVector,
    metadata: Option<ModelMetadata>,
}

impl InferenceEngine {
    /// Pair a fitted scaler and classifier.
    ///
    /// Fails when the classifier is unfitted or cannot report importance.
    pub fn new(scaler: StandardScaler, model: TrainedModel) -> Result<Self, ArtifactError> {
        if !model.is_fitted() {
            return Err(ArtifactError::Invalid("classifier is not fitted".to_string()));
        }
        let importance = model.feature_importance().ok_or_else(|| {
            ArtifactError::Invalid("classifier does not report feature importance".to_string())
        })?;
        scaler.validate()?;

        Ok(Self {
            scaler,
            model,
            importance,
            metadata: None,
        })
    }

    /// Load the scaler and selected model from the artifact directory
    pub fn load(artifacts: &ArtifactsConfig) -> Result<Self, ArtifactError> {
        let loader = ModelLoader::new(artifacts.clone());
        let scaler = loader.load_scaler()?;
        let model = loader.load_best_model()?;

        let mut engine = Self::new(scaler.scaler, model.model)?;
        engine.metadata = Some(model.metadata);

        info!(
            model = %engine.kind(),
            dir = %artifacts.dir.display(),
            "Inference engine initialized"
        );
        Ok(engine)
    }

    pub fn kind(&self) -> ModelKind {
        self.model.kind()
    }

    /// Provenance of the loaded model, when loaded from disk
    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.metadata.as_ref()
    }

    /// Predict from raw (unscaled) features
    pub fn predict(&self, features: &FeatureVector) -> Result<PredictionResult, ModelError> {
        let scaled = self.scaler.transform(features);
        let probability = self.model.predict_probability(&scaled)?;
        let result = PredictionResult::from_probability(probability, self.importance);

        debug!(
            model = %self.kind(),
            risk = result.risk,
            probability = result.probability,
            "Inference complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::FEATURE_COUNT;
    use crate::models::{BoostingParams, GradientBoosting};

    fn engine() -> InferenceEngine {
        // Raw glucose around 100 decides the label
        let raw: Vec<FeatureVector> = (0..60)
            .map(|i| {
                let g = 70.0 + i as f64;
                [
                    40.0 + (i % 7) as f64,
                    25.0 + (i % 5) as f64,
                    115.0 + (i % 9) as f64,
                    g,
                    (i % 2) as f64,
                    (i % 4) as f64,
                    190.0 + (i % 3) as f64,
                    (i % 6) as f64,
                ]
            })
            .collect();
        let labels: Vec<u8> = raw.iter().map(|r| u8::from(r[3] > 100.0)).collect();

        let scaler = StandardScaler::fit(&raw).unwrap();
        let mut model = GradientBoosting::new(BoostingParams {
            n_estimators: 20,
            max_depth: 2,
            ..BoostingParams::default()
        });
        model.fit(&scaler.transform_batch(&raw), &labels).unwrap();

        InferenceEngine::new(scaler, model.into()).unwrap()
    }

    #[test]
    fn test_confidence_invariant() {
        let engine = engine();
        for g in [60.0, 95.0, 101.0, 180.0] {
            let result = engine
                .predict(&[45.0, 27.0, 120.0, g, 0.0, 1.0, 200.0, 2.0])
                .unwrap();
            assert!((result.confidence - result.probability.max(1.0 - result.probability)).abs() < 1e-15);
            assert!((0.5..=1.0).contains(&result.confidence));
            assert_eq!(result.risk, label_from_probability(result.probability));
        }
    }

    #[test]
    fn test_predicts_learned_rule() {
        let engine = engine();
        assert!(engine.metadata().is_none());
        let high = engine.predict(&[45.0, 27.0, 120.0, 125.0, 0.0, 1.0, 200.0, 2.0]).unwrap();
        let low = engine.predict(&[45.0, 27.0, 120.0, 75.0, 0.0, 1.0, 200.0, 2.0]).unwrap();
        assert_eq!(high.risk, 1);
        assert_eq!(low.risk, 0);
    }

    #[test]
    fn test_response_uses_labels() {
        let response = engine()
            .predict(&[50.0, 30.0, 130.0, 110.0, 1.0, 0.0, 220.0, 3.0])
            .unwrap()
            .to_response();

        assert_eq!(response.feature_importance.len(), FEATURE_COUNT);
        assert!(response.feature_importance.contains_key("Years with Condition"));
        assert!(response.feature_importance.values().all(|&v| v >= 0.0));
        let sum: f64 = response.feature_importance.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unfitted_model_rejected() {
        let scaler = StandardScaler::from_parts([0.0; FEATURE_COUNT], [1.0; FEATURE_COUNT]).unwrap();
        let model = GradientBoosting::new(BoostingParams::default());
        assert!(InferenceEngine::new(scaler, model.into()).is_err());
    }
}
