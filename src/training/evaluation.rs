//! Held-out evaluation metrics and cross-validation

use super::dataset::Dataset;
use super::split::{complement, stratified_folds};
use crate::error::{ModelError, TrainingError};
use crate::feature_extractor::{FeatureVector, FEATURES};
use crate::models::{label_from_probability, ModelKind, RiskClassifier, TrainedModel};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Binary confusion matrix (class 1 is positive)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(labels: &[u8], predicted: &[u8]) -> Self {
        let mut m = Self::default();
        for (&y, &p) in labels.iter().zip(predicted) {
            match (y, p) {
                (0, 0) => m.true_negative += 1,
                (0, _) => m.false_positive += 1,
                (_, 0) => m.false_negative += 1,
                _ => m.true_positive += 1,
            }
        }
        m
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_negative + self.true_positive, self.total())
    }

    /// Precision, recall, F1 and support for one class
    pub fn class_metrics(&self, class: u8) -> ClassMetrics {
        let (tp, fp, fn_) = if class == 1 {
            (self.true_positive, self.false_positive, self.false_negative)
        } else {
            (self.true_negative, self.false_negative, self.false_positive)
        };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        ClassMetrics {
            class,
            precision,
            recall,
            f1,
            support: tp + fn_,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Per-class classification metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Fraction of matching labels
pub fn accuracy(labels: &[u8], predicted: &[u8]) -> f64 {
    let correct = labels.iter().zip(predicted).filter(|(a, b)| a == b).count();
    ratio(correct, labels.len())
}

/// Area under the ROC curve via the rank statistic, averaging tied ranks.
///
/// `None` when only one class is present.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 || labels.len() != scores.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1 ..= end share their mean
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }

    let rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(&l, _)| l == 1)
        .map(|(_, &r)| r)
        .sum();
    let p = positives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

/// Metrics of one model on one labelled partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldoutMetrics {
    pub accuracy: f64,
    pub roc_auc: f64,
    pub confusion: ConfusionMatrix,
    pub classes: [ClassMetrics; 2],
}

/// Score a fitted model on scaled rows
pub fn evaluate<M>(model: &M, data: &Dataset) -> Result<HoldoutMetrics, ModelError>
where
    M: RiskClassifier + ?Sized,
{
    let probabilities = predict_probabilities(model, &data.features)?;
    let predicted: Vec<u8> = probabilities.iter().map(|&p| label_from_probability(p)).collect();
    let confusion = ConfusionMatrix::from_predictions(&data.labels, &predicted);

    Ok(HoldoutMetrics {
        accuracy: confusion.accuracy(),
        roc_auc: roc_auc(&data.labels, &probabilities).unwrap_or(f64::NAN),
        confusion,
        classes: [confusion.class_metrics(0), confusion.class_metrics(1)],
    })
}

fn predict_probabilities<M>(model: &M, rows: &[FeatureVector]) -> Result<Vec<f64>, ModelError>
where
    M: RiskClassifier + ?Sized,
{
    rows.iter().map(|r| model.predict_probability(r)).collect()
}

/// Cross-validated ROC-AUC summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidation {
    pub folds: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CrossValidation {
    /// Mean and population standard deviation, as stored in the report
    pub fn summary(&self) -> String {
        format!("{:.4} (std {:.4})", self.mean, self.std)
    }
}

/// Stratified k-fold ROC-AUC of a fresh copy of `template` on each fold.
pub fn cross_validate(
    template: &TrainedModel,
    data: &Dataset,
    k: usize,
    seed: u64,
) -> Result<CrossValidation, TrainingError> {
    let folds = stratified_folds(&data.labels, k, seed)?;
    let mut scores = Vec::with_capacity(k);

    for (i, fold) in folds.iter().enumerate() {
        let train = data.subset(&complement(data.len(), fold));
        let held_out = data.subset(fold);

        let mut model = template.clone();
        model.fit(&train.features, &train.labels)?;
        let probabilities = predict_probabilities(&model, &held_out.features)?;
        let auc = roc_auc(&held_out.labels, &probabilities).ok_or_else(|| {
            TrainingError::InfeasibleSplit(format!("fold {} holds a single class", i))
        })?;

        debug!(model = %template.kind(), fold = i, roc_auc = auc, "Cross-validation fold scored");
        scores.push(auc);
    }

    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let std = (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
    Ok(CrossValidation {
        folds: scores,
        mean,
        std,
    })
}

/// One entry of an importance ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFeature {
    pub feature: String,
    pub importance: f64,
}

/// Importances paired with their labels, most important first
pub fn rank_importance(importance: &FeatureVector) -> Vec<RankedFeature> {
    let mut ranked: Vec<RankedFeature> = FEATURES
        .iter()
        .zip(importance)
        .map(|(spec, &v)| RankedFeature {
            feature: spec.label.to_string(),
            importance: v,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(Ordering::Equal)
    });
    ranked
}

/// Everything measured about one trained candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub kind: ModelKind,
    pub train_accuracy: f64,
    pub test: HoldoutMetrics,
    pub cross_validation: Option<CrossValidation>,
    pub feature_ranking: Vec<RankedFeature>,
}
