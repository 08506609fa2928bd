//! Best-model selection across trained candidates

use super::ModelKind;
use serde::{Deserialize, Serialize};

/// Held-out metric used to rank candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMetric {
    #[default]
    Accuracy,
    RocAuc,
}

/// Held-out scores of one trained candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScore {
    pub kind: ModelKind,
    pub accuracy: f64,
    pub roc_auc: f64,
}

impl CandidateScore {
    fn metric(&self, metric: SelectionMetric) -> f64 {
        match metric {
            SelectionMetric::Accuracy => self.accuracy,
            SelectionMetric::RocAuc => self.roc_auc,
        }
    }
}

/// Picks the deployment model among trained candidates.
///
/// The highest score wins. On a tie the candidate declared later wins, so
/// with candidates in `[bagging, boosting]` order the bagging model is only
/// chosen when it is strictly better.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelSelector {
    metric: SelectionMetric,
}

impl ModelSelector {
    pub fn new(metric: SelectionMetric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> SelectionMetric {
        self.metric
    }

    /// Index of the winning candidate. `None` when no candidate has a
    /// finite score.
    pub fn select(&self, candidates: &[CandidateScore]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.metric(self.metric).is_finite())
            .fold(None, |best: Option<(usize, f64)>, (i, c)| {
                let score = c.metric(self.metric);
                match best {
                    Some((_, top)) if score < top => best,
                    _ => Some((i, score)),
                }
            })
            .map(|(i, _)| i)
    }

    /// Score gap between the winner and the runner-up.
    pub fn margin(&self, candidates: &[CandidateScore]) -> Option<f64> {
        let winner = self.select(candidates)?;
        let top = candidates[winner].metric(self.metric);
        candidates
            .iter()
            .enumerate()
            .filter(|&(i, c)| i != winner && c.metric(self.metric).is_finite())
            .map(|(_, c)| top - c.metric(self.metric))
            .reduce(f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(forest: f64, boosting: f64) -> Vec<CandidateScore> {
        vec![
            CandidateScore {
                kind: ModelKind::Bagging,
                accuracy: forest,
                roc_auc: 0.9,
            },
            CandidateScore {
                kind: ModelKind::Boosting,
                accuracy: boosting,
                roc_auc: 0.8,
            },
        ]
    }

    #[test]
    fn test_higher_accuracy_wins() {
        let selector = ModelSelector::default();
        assert_eq!(selector.select(&candidates(0.91, 0.88)), Some(0));
        assert_eq!(selector.select(&candidates(0.85, 0.88)), Some(1));
    }

    #[test]
    fn test_tie_goes_to_later_candidate() {
        let selector = ModelSelector::default();
        let scores = candidates(0.9, 0.9);
        let winner = selector.select(&scores).unwrap();
        assert_eq!(scores[winner].kind, ModelKind::Boosting);
    }

    #[test]
    fn test_roc_auc_metric() {
        let selector = ModelSelector::new(SelectionMetric::RocAuc);
        assert_eq!(selector.select(&candidates(0.5, 0.99)), Some(0));
    }

    #[test]
    fn test_non_finite_scores_skipped() {
        let selector = ModelSelector::default();
        assert_eq!(selector.select(&candidates(f64::NAN, 0.7)), Some(1));
        assert_eq!(selector.select(&candidates(f64::NAN, f64::NAN)), None);
        assert_eq!(selector.select(&[]), None);
    }

    #[test]
    fn test_margin() {
        let selector = ModelSelector::default();
        let margin = selector.margin(&candidates(0.92, 0.9)).unwrap();
        assert!((margin - 0.02).abs() < 1e-12);
        assert_eq!(selector.margin(&candidates(0.92, 0.92)), Some(0.0));
    }
}
