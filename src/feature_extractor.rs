//! Feature extraction for diabetes risk model inference.
//!
//! This module maps an untyped request payload onto the fixed-order
//! feature vector the scaler and classifiers were trained on.

use crate::error::CodecError;
use serde_json::{Map, Value};

/// Number of model input features.
pub const FEATURE_COUNT: usize = 8;

/// A fixed-order patient feature vector.
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Static description of one model feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSpec {
    /// Internal column name (dataset header)
    pub name: &'static str,
    /// Key expected in the request payload
    pub payload_key: &'static str,
    /// Human readable label used in importance reports
    pub label: &'static str,
    /// Value substituted when the key is absent
    pub default: f64,
}

/// Feature schema in model order. Never reorder.
pub const FEATURES: [FeatureSpec; FEATURE_COUNT] = [
    FeatureSpec {
        name: "age",
        payload_key: "age",
        label: "Age",
        default: 0.0,
    },
    FeatureSpec {
        name: "bmi",
        payload_key: "bmi",
        label: "BMI",
        default: 0.0,
    },
    FeatureSpec {
        name: "bp_systolic",
        payload_key: "bp_systolic",
        label: "Blood Pressure",
        default: 0.0,
    },
    FeatureSpec {
        name: "fasting_glucose",
        payload_key: "fasting_glucose",
        label: "Fasting Glucose",
        default: 0.0,
    },
    FeatureSpec {
        name: "family_history",
        payload_key: "familyHistory",
        label: "Family History",
        default: 0.0,
    },
    FeatureSpec {
        name: "activity_level",
        payload_key: "activityLevel",
        label: "Activity Level",
        default: 0.0,
    },
    // Clinically normal total cholesterol (mg/dL)
    FeatureSpec {
        name: "cholesterol",
        payload_key: "cholesterol",
        label: "Cholesterol",
        default: 200.0,
    },
    FeatureSpec {
        name: "years_condition",
        payload_key: "yearsCondition",
        label: "Years with Condition",
        default: 0.0,
    },
];

/// Feature extractor that transforms request payloads into model input features.
///
/// Stateless; a single instance can be shared across concurrent requests.
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract features from a JSON payload.
    ///
    /// Missing keys take their schema default. Any present value that cannot
    /// be coerced to a finite float fails the whole extraction.
    pub fn extract(&self, payload: &Value) -> Result<FeatureVector, CodecError> {
        let object = payload.as_object().ok_or(CodecError::NotAnObject)?;
        self.extract_object(object)
    }

    /// Extract features from an already destructured JSON object.
    pub fn extract_object(&self, object: &Map<String, Value>) -> Result<FeatureVector, CodecError> {
        let mut features = [0.0; FEATURE_COUNT];

        for (slot, spec) in features.iter_mut().zip(FEATURES.iter()) {
            *slot = match object.get(spec.payload_key) {
                Some(value) => coerce(spec.payload_key, value)?,
                None => spec.default,
            };
        }

        Ok(features)
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get internal feature names (dataset column order).
    pub fn feature_names(&self) -> Vec<&'static str> {
        FEATURES.iter().map(|f| f.name).collect()
    }

    /// Get report labels (same order as the vector).
    pub fn feature_labels(&self) -> Vec<&'static str> {
        FEATURES.iter().map(|f| f.label).collect()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Coerce a single JSON value to a finite float.
fn coerce(field: &'static str, value: &Value) -> Result<f64, CodecError> {
    let number = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| CodecError::NotNumeric {
            field,
            value: n.to_string(),
        })?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| CodecError::NotNumeric {
            field,
            value: format!("'{}'", s),
        })?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        other => {
            return Err(CodecError::NotNumeric {
                field,
                value: other.to_string(),
            })
        }
    };

    if !number.is_finite() {
        return Err(CodecError::NonFinite {
            field,
            value: number,
        });
    }

    Ok(number)
}
