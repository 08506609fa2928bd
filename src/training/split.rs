//! Stratified train/test split and k-fold partitioning

use crate::error::TrainingError;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of each partition, sorted ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Row indices per class, in row order
fn class_indices(labels: &[u8]) -> [Vec<usize>; 2] {
    let mut classes = [Vec::new(), Vec::new()];
    for (i, &label) in labels.iter().enumerate() {
        classes[usize::from(label.min(1))].push(i);
    }
    classes
}

/// Split rows so both partitions keep the label ratio.
///
/// Each class contributes `round(count * test_fraction)` rows to the test
/// partition, clamped so both partitions hold at least one row of it.
pub fn stratified_split(labels: &[u8], test_fraction: f64, seed: u64) -> Result<Split, TrainingError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TrainingError::InfeasibleSplit(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for (class, mut members) in class_indices(labels).into_iter().enumerate() {
        if members.len() < 2 {
            return Err(TrainingError::InfeasibleSplit(format!(
                "class {} has {} member(s), at least 2 are required",
                class,
                members.len()
            )));
        }

        members.shuffle(&mut rng);
        let n_test = ((members.len() as f64 * test_fraction).round() as usize)
            .clamp(1, members.len() - 1);
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split { train, test })
}

/// Deal each class round-robin into `k` folds after a seeded shuffle.
pub fn stratified_folds(labels: &[u8], k: usize, seed: u64) -> Result<Vec<Vec<usize>>, TrainingError> {
    if k < 2 {
        return Err(TrainingError::InfeasibleSplit(format!(
            "cross-validation needs at least 2 folds, got {}",
            k
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut folds = vec![Vec::new(); k];

    for (class, mut members) in class_indices(labels).into_iter().enumerate() {
        if members.len() < k {
            return Err(TrainingError::InfeasibleSplit(format!(
                "class {} has {} member(s), fewer than {} folds",
                class,
                members.len(),
                k
            )));
        }
        members.shuffle(&mut rng);
        for (i, idx) in members.into_iter().enumerate() {
            folds[i % k].push(idx);
        }
    }

    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Indices of every row outside `fold`
pub fn complement(n: usize, fold: &[usize]) -> Vec<usize> {
    let mut held_out = vec![false; n];
    for &i in fold {
        held_out[i] = true;
    }
    (0..n).filter(|&i| !held_out[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(positives: usize, negatives: usize) -> Vec<u8> {
        let mut labels = vec![1; positives];
        labels.extend(vec![0; negatives]);
        labels
    }

    #[test]
    fn test_split_preserves_ratio() {
        let labels = labels(300, 700);
        let split = stratified_split(&labels, 0.2, 42).unwrap();

        assert_eq!(split.test.len(), 200);
        assert_eq!(split.train.len(), 800);
        let test_pos = split.test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(test_pos, 60);
    }

    #[test]
    fn test_split_is_disjoint_and_complete() {
        let labels = labels(37, 63);
        let split = stratified_split(&labels, 0.25, 1).unwrap();

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_deterministic() {
        let labels = labels(40, 60);
        assert_eq!(
            stratified_split(&labels, 0.2, 42).unwrap(),
            stratified_split(&labels, 0.2, 42).unwrap()
        );
        assert_ne!(
            stratified_split(&labels, 0.2, 42).unwrap(),
            stratified_split(&labels, 0.2, 43).unwrap()
        );
    }

    #[test]
    fn test_single_class_is_infeasible() {
        assert!(matches!(
            stratified_split(&labels(0, 50), 0.2, 42),
            Err(TrainingError::InfeasibleSplit(_))
        ));
        assert!(matches!(
            stratified_split(&labels(1, 50), 0.2, 42),
            Err(TrainingError::InfeasibleSplit(_))
        ));
    }

    #[test]
    fn test_folds_are_stratified() {
        let labels = labels(50, 100);
        let folds = stratified_folds(&labels, 5, 42).unwrap();

        assert_eq!(folds.len(), 5);
        for fold in &folds {
            assert_eq!(fold.len(), 30);
            assert_eq!(fold.iter().filter(|&&i| labels[i] == 1).count(), 10);
        }
        assert_eq!(complement(150, &folds[0]).len(), 120);
    }

    #[test]
    fn test_too_few_members_for_folds() {
        assert!(stratified_folds(&labels(3, 40), 5, 42).is_err());
        assert!(stratified_folds(&labels(10, 10), 1, 42).is_err());
    }
}
