//! Prediction response data structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body returned by `GET /api/health`
pub const HEALTH_STATUS: &str = "ML Server is running";

/// Successful `POST /api/predict` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Predicted label (1 = at risk)
    pub risk: u8,
    /// Probability of label 1
    pub probability: f64,
    /// Probability mass of the predicted class, in [0.5, 1]
    pub confidence: f64,
    /// Importance per feature label
    pub feature_importance: BTreeMap<String, f64>,
}

/// Error body for every failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Liveness body; identical whether or not a model is loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: HEALTH_STATUS.to_string(),
        }
    }
}
