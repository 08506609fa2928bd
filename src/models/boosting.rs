//! Gradient-boosted trees (binary log-loss) risk classifier

use super::tree::{DecisionTree, TreeParams};
use super::{normalize_importances, validate_training_set, ModelKind, RiskClassifier};
use crate::error::ModelError;
use crate::feature_extractor::{FeatureVector, FEATURE_COUNT};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Clamp for the prior so the initial log-odds stay finite.
const PRIOR_EPS: f64 = 1e-15;

/// Gradient boosting hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) per stage
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 150,
            learning_rate: 0.1,
            max_depth: 5,
            min_samples_split: 5,
            min_samples_leaf: 2,
            subsample: 1.0,
            seed: 42,
        }
    }
}

impl BoostingParams {
    fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidParams(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ModelError::InvalidParams(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ModelError::InvalidParams(format!(
                "subsample must be in (0, 1], got {}",
                self.subsample
            )));
        }
        Ok(())
    }
}

/// Additive ensemble of regression trees on the log-odds scale.
///
/// Each stage fits the negative gradient of the log-loss and stores a
/// Newton step in its leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    params: BoostingParams,
    /// Log-odds of the training prior
    init: f64,
    trees: Vec<DecisionTree>,
    importances: Option<FeatureVector>,
}

impl GradientBoosting {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            init: 0.0,
            trees: Vec::new(),
            importances: None,
        }
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn stage_count(&self) -> usize {
        self.trees.len()
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        self.init.is_finite()
            && !self.trees.is_empty()
            && self.trees.iter().all(DecisionTree::is_well_formed)
            && self.importances.is_some()
    }

    /// Raw additive score (log-odds) for one row.
    fn decision_function(&self, features: &FeatureVector) -> f64 {
        let lr = self.params.learning_rate;
        self.init + self.trees.iter().map(|t| lr * t.predict(features)).sum::<f64>()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl RiskClassifier for GradientBoosting {
    fn kind(&self) -> ModelKind {
        ModelKind::Boosting
    }

    fn fit(&mut self, features: &[FeatureVector], labels: &[u8]) -> Result<(), ModelError> {
        validate_training_set(features, labels)?;
        self.params.validate()?;

        let n = features.len();
        let targets: Vec<f64> = labels.iter().map(|&l| l as f64).collect();
        let prior = (targets.iter().sum::<f64>() / n as f64).clamp(PRIOR_EPS, 1.0 - PRIOR_EPS);
        let init = (prior / (1.0 - prior)).ln();

        let tree_params = TreeParams {
            max_depth: Some(self.params.max_depth),
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: None,
        };
        let stage_size = ((self.params.subsample * n as f64) as usize).clamp(1, n);

        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        let mut raw = vec![init; n];
        let mut residuals = vec![0.0; n];
        let mut hessians = vec![0.0; n];
        let mut trees = Vec::with_capacity(self.params.n_estimators);
        let mut total = [0.0; FEATURE_COUNT];

        for _ in 0..self.params.n_estimators {
            for i in 0..n {
                let p = sigmoid(raw[i]);
                residuals[i] = targets[i] - p;
                hessians[i] = p * (1.0 - p);
            }

            let samples: Vec<usize> = if stage_size < n {
                let mut picked = index::sample(&mut rng, n, stage_size).into_vec();
                picked.sort_unstable();
                picked
            } else {
                (0..n).collect()
            };

            let tree = DecisionTree::fit(features, &residuals, samples, &tree_params, &mut rng, |s| {
                let numerator: f64 = s.iter().map(|&i| residuals[i]).sum();
                let denominator: f64 = s.iter().map(|&i| hessians[i]).sum();
                if denominator.abs() < 1e-150 {
                    0.0
                } else {
                    numerator / denominator
                }
            });

            for (r, row) in raw.iter_mut().zip(features) {
                *r += self.params.learning_rate * tree.predict(row);
            }
            for (t, v) in total.iter_mut().zip(tree.raw_importances()) {
                *t += v;
            }
            trees.push(tree);
        }

        debug!(
            stages = trees.len(),
            init_log_odds = init,
            "Gradient boosting fitted"
        );

        self.init = init;
        self.trees = trees;
        self.importances = Some(normalize_importances(total));
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn predict_probability(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        Ok(sigmoid(self.decision_function(features)).clamp(0.0, 1.0))
    }

    fn feature_importance(&self) -> Option<FeatureVector> {
        self.importances
    }
}
