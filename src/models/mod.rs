//! Risk classifiers, artifact persistence and inference

pub mod boosting;
pub mod forest;
pub mod inference;
pub mod loader;
pub mod selection;
pub mod tree;

pub use boosting::{BoostingParams, GradientBoosting};
pub use forest::{ForestParams, MaxFeatures, RandomForest};
pub use inference::InferenceEngine;
pub use loader::ModelLoader;
pub use selection::ModelSelector;

use crate::error::ModelError;
use crate::feature_extractor::{FeatureVector, FEATURE_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability interface every risk classifier implements.
///
/// Inputs are always scaled feature vectors. Implementations must be
/// deterministic for a fixed seed and safe to share across threads once
/// fitted.
pub trait RiskClassifier: Send + Sync {
    /// Which variant this is
    fn kind(&self) -> ModelKind;

    /// Fit on scaled rows and their 0/1 labels
    fn fit(&mut self, features: &[FeatureVector], labels: &[u8]) -> Result<(), ModelError>;

    /// Whether `fit` has completed
    fn is_fitted(&self) -> bool;

    /// Probability of label 1
    fn predict_probability(&self, features: &FeatureVector) -> Result<f64, ModelError>;

    /// Predicted label; class 1 only when strictly more likely than class 0
    fn predict_label(&self, features: &FeatureVector) -> Result<u8, ModelError> {
        self.predict_probability(features).map(label_from_probability)
    }

    /// Per-feature importance in feature order, summing to one.
    /// `None` before fitting.
    fn feature_importance(&self) -> Option<FeatureVector>;
}

/// Classifier variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Bagged decision trees (random forest)
    Bagging,
    /// Sequential additive trees (gradient boosting)
    Boosting,
}

impl ModelKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Bagging => "Random Forest",
            ModelKind::Boosting => "Gradient Boosting",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A fitted classifier of either variant, as persisted in artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainedModel {
    Bagging(RandomForest),
    Boosting(GradientBoosting),
}

impl TrainedModel {
    fn inner(&self) -> &dyn RiskClassifier {
        match self {
            TrainedModel::Bagging(m) => m,
            TrainedModel::Boosting(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn RiskClassifier {
        match self {
            TrainedModel::Bagging(m) => m,
            TrainedModel::Boosting(m) => m,
        }
    }

    /// Structural check for models read back from disk.
    pub fn is_well_formed(&self) -> bool {
        match self {
            TrainedModel::Bagging(m) => m.is_well_formed(),
            TrainedModel::Boosting(m) => m.is_well_formed(),
        }
    }
}

impl RiskClassifier for TrainedModel {
    fn kind(&self) -> ModelKind {
        self.inner().kind()
    }

    fn fit(&mut self, features: &[FeatureVector], labels: &[u8]) -> Result<(), ModelError> {
        self.inner_mut().fit(features, labels)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }

    fn predict_probability(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        self.inner().predict_probability(features)
    }

    fn feature_importance(&self) -> Option<FeatureVector> {
        self.inner().feature_importance()
    }
}

impl From<RandomForest> for TrainedModel {
    fn from(model: RandomForest) -> Self {
        TrainedModel::Bagging(model)
    }
}

impl From<GradientBoosting> for TrainedModel {
    fn from(model: GradientBoosting) -> Self {
        TrainedModel::Boosting(model)
    }
}

/// Class 1 iff its probability is strictly above one half.
pub fn label_from_probability(probability: f64) -> u8 {
    if probability > 0.5 {
        1
    } else {
        0
    }
}

/// Check a training set before fitting.
pub(crate) fn validate_training_set(
    features: &[FeatureVector],
    labels: &[u8],
) -> Result<(), ModelError> {
    if features.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if features.len() != labels.len() {
        return Err(ModelError::LengthMismatch {
            rows: features.len(),
            labels: labels.len(),
        });
    }
    if let Some((row, &label)) = labels.iter().enumerate().find(|&(_, &l)| l > 1) {
        return Err(ModelError::InvalidLabel { row, label });
    }
    let positives = labels.iter().filter(|&&l| l == 1).count();
    if positives == 0 || positives == labels.len() {
        return Err(ModelError::SingleClass);
    }
    Ok(())
}

/// Normalize summed importances; falls back to uniform when no split was made.
pub(crate) fn normalize_importances(total: FeatureVector) -> FeatureVector {
    let sum: f64 = total.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        let mut out = [0.0; FEATURE_COUNT];
        for (o, &v) in out.iter_mut().zip(&total) {
            *o = v / sum;
        }
        out
    } else {
        [1.0 / FEATURE_COUNT as f64; FEATURE_COUNT]
    }
}
