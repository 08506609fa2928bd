//! CART regression tree shared by the bagging and boosting classifiers
//!
//! Splits minimise the summed squared error of the targets. For 0/1 targets
//! this ranks splits identically to Gini impurity, so the same builder
//! grows the forest's classification trees and the booster's residual trees.

use crate::feature_extractor::{FeatureVector, FEATURE_COUNT};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Minimum impurity decrease for a split to be accepted.
const MIN_GAIN: f64 = 1e-12;

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth (root is depth 0); `None` grows until leaves are pure
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs before it may be split
    pub min_samples_split: usize,
    /// Minimum samples on each side of a split
    pub min_samples_leaf: usize,
    /// Features inspected per split; `None` inspects all of them
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted tree. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    /// Unnormalized impurity decrease accumulated per feature
    importances: FeatureVector,
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Builder<'a, R, F> {
    rows: &'a [FeatureVector],
    targets: &'a [f64],
    params: &'a TreeParams,
    rng: &'a mut R,
    leaf_value: F,
    nodes: Vec<Node>,
    importances: FeatureVector,
}

impl DecisionTree {
    /// Grow a tree over `samples` (indices into `rows`, repeats allowed).
    ///
    /// `leaf_value` turns the sample indices that reach a leaf into the
    /// value stored there.
    pub fn fit<R, F>(
        rows: &[FeatureVector],
        targets: &[f64],
        mut samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
        leaf_value: F,
    ) -> Self
    where
        R: Rng,
        F: Fn(&[usize]) -> f64,
    {
        let mut builder = Builder {
            rows,
            targets,
            params,
            rng,
            leaf_value,
            nodes: Vec::new(),
            importances: [0.0; FEATURE_COUNT],
        };
        builder.build(&mut samples, 0);

        Self {
            nodes: builder.nodes,
            importances: builder.importances,
        }
    }

    /// Value of the leaf `features` falls into.
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn raw_importances(&self) -> &FeatureVector {
        &self.importances
    }

    /// Importances scaled to sum to one (all zeros for a single-leaf tree).
    pub fn normalized_importances(&self) -> FeatureVector {
        let total: f64 = self.importances.iter().sum();
        let mut out = [0.0; FEATURE_COUNT];
        if total > 0.0 {
            for (o, &v) in out.iter_mut().zip(&self.importances) {
                *o = v / total;
            }
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Structural sanity check used when loading persisted models.
    pub fn is_well_formed(&self) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        self.nodes.iter().enumerate().all(|(i, node)| match node {
            Node::Leaf { value } => value.is_finite(),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                *feature < FEATURE_COUNT
                    && threshold.is_finite()
                    && *left > i
                    && *right > i
                    && *left < self.nodes.len()
                    && *right < self.nodes.len()
            }
        })
    }
}

impl<'a, R, F> Builder<'a, R, F>
where
    R: Rng,
    F: Fn(&[usize]) -> f64,
{
    fn build(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let n = samples.len();
        let (sum, sum_sq) = samples.iter().fold((0.0, 0.0), |(s, sq), &i| {
            let y = self.targets[i];
            (s + y, sq + y * y)
        });
        let sse = sum_sq - sum * sum / n as f64;

        let depth_ok = self.params.max_depth.map_or(true, |max| depth < max);
        let splittable = depth_ok
            && n >= self.params.min_samples_split
            && n >= 2 * self.params.min_samples_leaf.max(1)
            && sse > MIN_GAIN;

        if splittable {
            if let Some(split) = self.best_split(samples, sum, sum_sq) {
                let id = self.nodes.len();
                self.nodes.push(Node::Leaf { value: 0.0 });
                self.importances[split.feature] += split.gain;

                let (mut left, mut right): (Vec<usize>, Vec<usize>) = samples
                    .iter()
                    .partition(|&&i| self.rows[i][split.feature] <= split.threshold);

                let left_id = self.build(&mut left, depth + 1);
                let right_id = self.build(&mut right, depth + 1);
                self.nodes[id] = Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: left_id,
                    right: right_id,
                };
                return id;
            }
        }

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: (self.leaf_value)(&*samples),
        });
        id
    }

    fn best_split(&mut self, samples: &[usize], sum: f64, sum_sq: f64) -> Option<Split> {
        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let max_features = self
            .params
            .max_features
            .unwrap_or(FEATURE_COUNT)
            .clamp(1, FEATURE_COUNT);
        let parent_sse = sum_sq - sum * sum / n as f64;

        let mut order: Vec<usize> = (0..FEATURE_COUNT).collect();
        order.shuffle(&mut *self.rng);

        let mut best: Option<Split> = None;
        let mut sorted = samples.to_vec();

        for (visited, &feature) in order.iter().enumerate() {
            // keep looking past max_features until some valid split exists
            if visited >= max_features && best.is_some() {
                break;
            }

            let rows = self.rows;
            sorted.sort_by(|&a, &b| {
                rows[a][feature]
                    .partial_cmp(&rows[b][feature])
                    .unwrap_or(Ordering::Equal)
            });
            if rows[sorted[0]][feature] >= rows[sorted[n - 1]][feature] {
                continue;
            }

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for i in 0..n - 1 {
                let y = self.targets[sorted[i]];
                left_sum += y;
                left_sq += y * y;

                let left_n = i + 1;
                let right_n = n - left_n;
                if left_n < min_leaf {
                    continue;
                }
                if right_n < min_leaf {
                    break;
                }

                let value = rows[sorted[i]][feature];
                let next = rows[sorted[i + 1]][feature];
                if next <= value {
                    continue;
                }

                let left_sse = left_sq - left_sum * left_sum / left_n as f64;
                let right_sum = sum - left_sum;
                let right_sse = (sum_sq - left_sq) - right_sum * right_sum / right_n as f64;
                let gain = (parent_sse - left_sse - right_sse).max(0.0);

                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// Mean of the targets at the given indices.
pub fn mean_target(targets: &[f64], samples: &[usize]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&i| targets[i]).sum::<f64>() / samples.len() as f64
}
