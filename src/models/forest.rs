//! Random forest (bagging) risk classifier

use super::tree::{mean_target, DecisionTree, TreeParams};
use super::{normalize_importances, validate_training_set, ModelKind, RiskClassifier};
use crate::error::ModelError;
use crate::feature_extractor::{FeatureVector, FEATURE_COUNT};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::thread;
use tracing::debug;

/// Number of candidate features inspected per split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    /// floor(sqrt(n)) features
    #[default]
    Sqrt,
    /// floor(log2(n)) features
    Log2,
    /// Every feature
    All,
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::All => n_features,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    /// Worker threads used while fitting (1 = sequential)
    pub n_jobs: usize,
    pub seed: u64,
}

fn default_threads() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: Some(12),
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            n_jobs: default_threads(),
            seed: 42,
        }
    }
}

/// Bagged ensemble of CART trees. Probability is the mean leaf frequency
/// of class 1 across trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
    importances: Option<FeatureVector>,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            importances: None,
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        !self.trees.is_empty()
            && self.trees.iter().all(DecisionTree::is_well_formed)
            && self.importances.is_some()
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: Some(self.params.max_features.resolve(FEATURE_COUNT)),
        }
    }
}

/// Grow one bootstrapped tree from its own seed.
fn grow_tree(
    rows: &[FeatureVector],
    targets: &[f64],
    params: &TreeParams,
    bootstrap: bool,
    seed: u64,
) -> DecisionTree {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = rows.len();
    let samples: Vec<usize> = if bootstrap {
        (0..n).map(|_| rng.gen_range(0..n)).collect()
    } else {
        (0..n).collect()
    };
    DecisionTree::fit(rows, targets, samples, params, &mut rng, |s| {
        mean_target(targets, s)
    })
}

impl RiskClassifier for RandomForest {
    fn kind(&self) -> ModelKind {
        ModelKind::Bagging
    }

    fn fit(&mut self, features: &[FeatureVector], labels: &[u8]) -> Result<(), ModelError> {
        validate_training_set(features, labels)?;
        if self.params.n_estimators == 0 {
            return Err(ModelError::InvalidParams(
                "n_estimators must be at least 1".to_string(),
            ));
        }

        let targets: Vec<f64> = labels.iter().map(|&l| l as f64).collect();
        let tree_params = self.tree_params();

        // Per-tree seeds are drawn up front so the result does not depend on
        // how trees are spread over threads.
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        let seeds: Vec<u64> = (0..self.params.n_estimators).map(|_| rng.gen()).collect();

        let workers = self.params.n_jobs.clamp(1, seeds.len());
        let chunk_size = (seeds.len() + workers - 1) / workers;
        let bootstrap = self.params.bootstrap;

        let trees: Vec<DecisionTree> = thread::scope(|scope| {
            let handles: Vec<_> = seeds
                .chunks(chunk_size)
                .map(|chunk| {
                    let targets = &targets;
                    let tree_params = &tree_params;
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|&seed| grow_tree(features, targets, tree_params, bootstrap, seed))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_default())
                .collect()
        });

        if trees.len() != self.params.n_estimators {
            return Err(ModelError::InvalidParams(format!(
                "expected {} trees, grew {}",
                self.params.n_estimators,
                trees.len()
            )));
        }

        let mut total = [0.0; FEATURE_COUNT];
        for tree in &trees {
            for (t, v) in total.iter_mut().zip(tree.normalized_importances()) {
                *t += v;
            }
        }

        debug!(
            trees = trees.len(),
            nodes = trees.iter().map(DecisionTree::node_count).sum::<usize>(),
            "Random forest fitted"
        );

        self.importances = Some(normalize_importances(total));
        self.trees = trees;
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn predict_probability(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        Ok((sum / self.trees.len() as f64).clamp(0.0, 1.0))
    }

    fn feature_importance(&self) -> Option<FeatureVector> {
        self.importances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Label is 1 when the first feature is positive; the rest is noise.
    fn toy_data(n: usize, seed: u64) -> (Vec<FeatureVector>, Vec<u8>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut rows = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for _ in 0..n {
            let mut row = [0.0; FEATURE_COUNT];
            for v in row.iter_mut() {
                *v = rng.gen_range(-1.0..1.0);
            }
            labels.push(u8::from(row[0] > 0.0));
            rows.push(row);
        }
        (rows, labels)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 20,
            max_depth: Some(6),
            n_jobs: 2,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(8), 2);
        assert_eq!(MaxFeatures::Log2.resolve(8), 3);
        assert_eq!(MaxFeatures::All.resolve(8), 8);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
    }

    #[test]
    fn test_unfitted_model_errors() {
        let model = RandomForest::new(small_params());
        assert!(!model.is_fitted());
        assert!(model.feature_importance().is_none());
        assert!(matches!(
            model.predict_probability(&[0.0; FEATURE_COUNT]),
            Err(ModelError::NotFitted)
        ));
    }

    #[test]
    fn test_learns_simple_rule() {
        let (rows, labels) = toy_data(300, 3);
        let mut model = RandomForest::new(small_params());
        model.fit(&rows, &labels).unwrap();
        assert_eq!(model.tree_count(), 20);

        let mut point = [0.0; FEATURE_COUNT];
        point[0] = 0.8;
        assert_eq!(model.predict_label(&point).unwrap(), 1);
        point[0] = -0.8;
        assert_eq!(model.predict_label(&point).unwrap(), 0);

        let importance = model.feature_importance().unwrap();
        assert!(importance.iter().all(|&v| v >= 0.0));
        assert!((importance.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        let top = importance
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(top, 0);
    }

    #[test]
    fn test_deterministic_regardless_of_threads() {
        let (rows, labels) = toy_data(200, 11);

        let mut a = RandomForest::new(ForestParams {
            n_jobs: 1,
            ..small_params()
        });
        let mut b = RandomForest::new(ForestParams {
            n_jobs: 4,
            ..small_params()
        });
        a.fit(&rows, &labels).unwrap();
        b.fit(&rows, &labels).unwrap();

        assert_eq!(a.trees, b.trees);
        let point = [0.3, -0.2, 0.1, 0.0, 0.5, -0.5, 0.2, 0.9];
        assert_eq!(
            a.predict_probability(&point).unwrap(),
            b.predict_probability(&point).unwrap()
        );
    }

    #[test]
    fn test_probability_bounds() {
        let (rows, labels) = toy_data(150, 5);
        let mut model = RandomForest::new(small_params());
        model.fit(&rows, &labels).unwrap();

        for row in &rows {
            let p = model.predict_probability(row).unwrap();
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let (rows, labels) = toy_data(20, 1);
        let mut model = RandomForest::new(ForestParams {
            n_estimators: 0,
            ..small_params()
        });
        assert!(matches!(
            model.fit(&rows, &labels),
            Err(ModelError::InvalidParams(_))
        ));
    }
}
