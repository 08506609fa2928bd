//! Prediction service: readiness state plus the per-request predict path

use crate::config::AppConfig;
use crate::error::PredictError;
use crate::feature_extractor::FeatureExtractor;
use crate::models::inference::{InferenceEngine, PredictionResult};
use crate::types::prediction::PredictionResponse;
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Whether a model is available to serve predictions
#[derive(Debug)]
enum ServiceState {
    Ready(InferenceEngine),
    Unready { reason: String },
}

/// Readiness as reported by [`PredictionService::health`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Unready,
}

/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug)]
pub struct PredictionService {
    extractor: FeatureExtractor,
    state: ServiceState,
}

impl PredictionService {
    /// Load artifacts named in the configuration.
    ///
    /// Never fails: a load error leaves the service Unready so that health
    /// checks and "Model not loaded" responses can still be served.
    pub fn start(config: &AppConfig) -> Self {
        match InferenceEngine::load(&config.artifacts) {
            Ok(engine) => {
                match engine.metadata() {
                    Some(meta) => info!(
                        model = %engine.kind(),
                        trained_at = %meta.trained_at,
                        test_accuracy = meta.test_accuracy,
                        roc_auc = meta.roc_auc,
                        "Prediction service ready"
                    ),
                    None => info!(model = %engine.kind(), "Prediction service ready"),
                }
                Self::ready(engine)
            }
            Err(e) => {
                error!(error = %e, "Failed to load model artifacts, serving without a model");
                Self::unready(e.to_string())
            }
        }
    }

    pub fn ready(engine: InferenceEngine) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            state: ServiceState::Ready(engine),
        }
    }

    pub fn unready(reason: impl Into<String>) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            state: ServiceState::Unready {
                reason: reason.into(),
            },
        }
    }

    pub fn health(&self) -> Readiness {
        match self.state {
            ServiceState::Ready(_) => Readiness::Ready,
            ServiceState::Unready { .. } => Readiness::Unready,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.health() == Readiness::Ready
    }

    /// Predict from a raw request body.
    ///
    /// Readiness is checked before the body is parsed.
    pub fn predict(&self, body: &[u8]) -> Result<PredictionResponse, PredictError> {
        let engine = self.engine()?;
        let payload: Value = serde_json::from_slice(body).map_err(|e| {
            debug!(error = %e, "Rejected malformed JSON body");
            PredictError::from(e)
        })?;
        self.run(engine, &payload).map(|r| r.to_response())
    }

    /// Predict from an already parsed payload
    pub fn predict_payload(&self, payload: &Value) -> Result<PredictionResult, PredictError> {
        let engine = self.engine()?;
        self.run(engine, payload)
    }

    fn engine(&self) -> Result<&InferenceEngine, PredictError> {
        match &self.state {
            ServiceState::Ready(engine) => Ok(engine),
            ServiceState::Unready { reason } => {
                debug!(reason = %reason, "Prediction requested while unready");
                Err(PredictError::ModelUnavailable)
            }
        }
    }

    fn run(&self, engine: &InferenceEngine, payload: &Value) -> Result<PredictionResult, PredictError> {
        let features = self.extractor.extract(payload).map_err(|e| {
            warn!(error = %e, "Rejected prediction payload");
            PredictError::from(e)
        })?;

        engine
            .predict(&features)
            .map_err(|e| PredictError::InvalidInput(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArtifactsConfig;
    use crate::models::{ForestParams, RandomForest, RiskClassifier};
    use crate::scaler::StandardScaler;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    fn ready_service() -> PredictionService {
        let raw: Vec<_> = (0..50)
            .map(|i| {
                let x = i as f64;
                [
                    30.0 + x,
                    20.0 + x / 3.0,
                    100.0 + x,
                    80.0 + x * 2.0,
                    (i % 2) as f64,
                    (i % 4) as f64,
                    150.0 + x * 3.0,
                    x / 5.0,
                ]
            })
            .collect();
        let labels: Vec<u8> = (0..50).map(|i| u8::from(i >= 25)).collect();

        let scaler = StandardScaler::fit(&raw).unwrap();
        let mut model = RandomForest::new(ForestParams {
            n_estimators: 10,
            n_jobs: 1,
            ..ForestParams::default()
        });
        model.fit(&scaler.transform_batch(&raw), &labels).unwrap();

        PredictionService::ready(InferenceEngine::new(scaler, model.into()).unwrap())
    }

    #[test]
    fn test_start_without_artifacts_is_unready() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.artifacts = ArtifactsConfig::in_dir(dir.path());

        let service = PredictionService::start(&config);
        assert_eq!(service.health(), Readiness::Unready);
        assert!(matches!(
            service.predict(br#"{"age": 50}"#),
            Err(PredictError::ModelUnavailable)
        ));
    }

    #[test]
    fn test_unready_checked_before_parsing() {
        let service = PredictionService::unready("no artifacts");
        assert!(matches!(
            service.predict(b"not json"),
            Err(PredictError::ModelUnavailable)
        ));
    }

    #[test]
    fn test_invalid_input_keeps_service_ready() {
        let service = ready_service();

        let err = service.predict(br#"{"age": "abc"}"#).unwrap_err();
        assert!(matches!(err, PredictError::InvalidInput(_)));
        assert!(err.to_string().contains("age"));

        assert!(service.is_ready());
        assert!(service.predict(br#"{"age": 40}"#).is_ok());
    }

    #[test]
    fn test_malformed_and_non_object_bodies() {
        let service = ready_service();
        assert!(matches!(
            service.predict(b"{"),
            Err(PredictError::InvalidInput(_))
        ));
        assert!(matches!(
            service.predict(b"[1, 2, 3]"),
            Err(PredictError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_predict_is_idempotent() {
        let service = ready_service();
        let body = br#"{"age": 55, "bmi": 31, "fasting_glucose": "120"}"#;

        let first = service.predict(body).unwrap();
        for _ in 0..5 {
            assert_eq!(service.predict(body).unwrap(), first);
        }
    }

    #[test]
    fn test_concurrent_predictions_agree() {
        let service = Arc::new(ready_service());
        let body = br#"{"age": 58, "bmi": 29.5, "bp_systolic": 142, "familyHistory": 1}"#;
        let expected = service.predict(body).unwrap();

        let responses: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let service = Arc::clone(&service);
                    scope.spawn(move || {
                        (0..25)
                            .map(|_| service.predict(body).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        assert_eq!(responses.len(), 200);
        assert!(responses.iter().all(|r| *r == expected));
        assert!(service.is_ready());
    }

    #[test]
    fn test_payload_and_body_paths_agree() {
        let service = ready_service();
        let payload = json!({"age": 61, "bmi": 33.5, "cholesterol": 260});

        let from_payload = service.predict_payload(&payload).unwrap().to_response();
        let from_body = service.predict(payload.to_string().as_bytes()).unwrap();
        assert_eq!(from_payload, from_body);
    }
}
