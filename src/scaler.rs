//! Standardization of feature vectors (zero mean, unit variance)

use crate::error::{ArtifactError, TrainingError};
use crate::feature_extractor::{FeatureVector, FEATURES, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// Fitted per-feature standardization parameters.
///
/// Immutable once fitted. Only [`StandardScaler::fit`] and
/// [`StandardScaler::from_parts`] construct one, and both reject
/// zero or non-finite deviations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: FeatureVector,
    scale: FeatureVector,
}

impl StandardScaler {
    /// Fit on the training partition.
    ///
    /// Uses the population standard deviation. A zero-variance column is a
    /// fatal configuration problem, not something to paper over.
    pub fn fit(rows: &[FeatureVector]) -> Result<Self, TrainingError> {
        if rows.is_empty() {
            return Err(TrainingError::DatasetFormat(
                "cannot fit scaler on zero rows".to_string(),
            ));
        }

        let n = rows.len() as f64;
        let mut mean = [0.0; FEATURE_COUNT];
        for row in rows {
            for (m, &x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut scale = [0.0; FEATURE_COUNT];
        for row in rows {
            for ((s, &x), &m) in scale.iter_mut().zip(row).zip(&mean) {
                *s += (x - m).powi(2);
            }
        }
        for (i, s) in scale.iter_mut().enumerate() {
            *s = (*s / n).sqrt();
            if !(*s > 0.0 && s.is_finite()) {
                return Err(TrainingError::DegenerateFeature {
                    feature: FEATURES[i].name,
                });
            }
        }

        Ok(Self { mean, scale })
    }

    /// Rebuild from persisted parameters, validating them.
    pub fn from_parts(mean: FeatureVector, scale: FeatureVector) -> Result<Self, ArtifactError> {
        let scaler = Self { mean, scale };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Check invariants on a deserialized scaler.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        for (i, (&m, &s)) in self.mean.iter().zip(&self.scale).enumerate() {
            if !m.is_finite() {
                return Err(ArtifactError::Invalid(format!(
                    "scaler mean for '{}' is not finite",
                    FEATURES[i].name
                )));
            }
            if !(s > 0.0 && s.is_finite()) {
                return Err(ArtifactError::Invalid(format!(
                    "scaler deviation for '{}' must be positive, got {}",
                    FEATURES[i].name, s
                )));
            }
        }
        Ok(())
    }

    /// Standardize a single vector.
    pub fn transform(&self, features: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            out[i] = (features[i] - self.mean[i]) / self.scale[i];
        }
        out
    }

    /// Standardize a batch of vectors.
    pub fn transform_batch(&self, rows: &[FeatureVector]) -> Vec<FeatureVector> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    /// Undo the standardization.
    pub fn inverse_transform(&self, scaled: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            out[i] = scaled[i] * self.scale[i] + self.mean[i];
        }
        out
    }

    pub fn mean(&self) -> &FeatureVector {
        &self.mean
    }

    pub fn scale(&self) -> &FeatureVector {
        &self.scale
    }
}
