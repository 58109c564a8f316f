//! Stratified train/test splits and k-fold partitions.

use rand::seq::SliceRandom;
use rand::{SeedableRng, rngs::StdRng};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("cannot split an empty label set")]
    Empty,
    #[error("test fraction {0} is not inside (0, 1)")]
    InvalidFraction(f64),
    #[error("class {class} has {count} member(s); stratification needs at least 2")]
    ClassTooSmall { class: usize, count: usize },
    #[error("split of {n} rows leaves {train} train and {test} test rows")]
    Degenerate { n: usize, train: usize, test: usize },
    #[error("need at least 2 folds, got {0}")]
    TooFewFolds(usize),
    #[error("{folds} folds requested but no class has that many members")]
    TooManyFolds { folds: usize },
}

/// Row indices of a two-way split, each list ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Per-class member counts, indexed by label.
pub fn class_counts(y: &[usize]) -> Vec<usize> {
    let n_classes = y.iter().copied().max().map_or(0, |max| max + 1);
    let mut counts = vec![0usize; n_classes];
    for &label in y {
        counts[label] += 1;
    }
    counts
}

/// Seeded stratified split keeping class proportions on both sides.
pub fn stratified_train_test_split(
    y: &[usize],
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestIndices, SplitError> {
    if y.is_empty() {
        return Err(SplitError::Empty);
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(SplitError::InvalidFraction(test_fraction));
    }
    let counts = class_counts(y);
    for (class, &count) in counts.iter().enumerate() {
        if count == 1 {
            return Err(SplitError::ClassTooSmall { class, count });
        }
    }

    let n = y.len();
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(SplitError::Degenerate {
            n,
            train: n.saturating_sub(n_test),
            test: n_test,
        });
    }

    let per_class = allocate_test_counts(&counts, n_test, n);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (class, &take) in per_class.iter().enumerate() {
        let mut members: Vec<usize> = (0..n).filter(|&i| y[i] == class).collect();
        members.shuffle(&mut rng);
        test.extend_from_slice(&members[..take]);
        train.extend_from_slice(&members[take..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    tracing::debug!(
        "Stratified split: {} train / {} test rows (seed {seed})",
        train.len(),
        test.len()
    );
    Ok(TrainTestIndices { train, test })
}

/// Largest-remainder allocation of `n_test` rows across classes.
fn allocate_test_counts(counts: &[usize], n_test: usize, n: usize) -> Vec<usize> {
    let exact: Vec<f64> = counts
        .iter()
        .map(|&c| c as f64 * n_test as f64 / n as f64)
        .collect();
    let mut alloc: Vec<usize> = exact.iter().map(|v| v.floor() as usize).collect();
    let assigned: usize = alloc.iter().sum();
    let mut order: Vec<usize> = (0..counts.len()).collect();
    // Stable sort keeps the smaller class index first on equal remainders.
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra)
    });
    for &class in order.iter().take(n_test.saturating_sub(assigned)) {
        alloc[class] += 1;
    }
    alloc
}

/// Unshuffled stratified k-fold partition.
///
/// Folds receive classes in the proportions of the sorted label sequence
/// taken every `k` entries, and each class fills folds in row order.
pub fn stratified_k_fold(y: &[usize], k: usize) -> Result<Vec<TrainTestIndices>, SplitError> {
    if k < 2 {
        return Err(SplitError::TooFewFolds(k));
    }
    if y.is_empty() {
        return Err(SplitError::Empty);
    }
    let counts = class_counts(y);
    let present: Vec<usize> = counts.iter().copied().filter(|&c| c > 0).collect();
    if present.iter().all(|&c| c < k) {
        return Err(SplitError::TooManyFolds { folds: k });
    }
    if let Some(&smallest) = present.iter().min() {
        if smallest < k {
            tracing::warn!(
                "The least populated class has only {smallest} members, fewer than {k} folds"
            );
        }
    }

    let mut sorted = y.to_vec();
    sorted.sort_unstable();
    let mut allocation = vec![vec![0usize; counts.len()]; k];
    for (pos, &label) in sorted.iter().enumerate() {
        allocation[pos % k][label] += 1;
    }

    let mut fold_of = vec![0usize; y.len()];
    for class in 0..counts.len() {
        let mut slots = Vec::with_capacity(counts[class]);
        for (fold, per_class) in allocation.iter().enumerate() {
            slots.extend(std::iter::repeat_n(fold, per_class[class]));
        }
        let members = (0..y.len()).filter(|&i| y[i] == class);
        for (row, fold) in members.zip(slots) {
            fold_of[row] = fold;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&row| fold_of[row] == fold);
            TrainTestIndices { train, test }
        })
        .collect())
}

/// Gather rows of `values` at `indices`.
pub fn select<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(neg: usize, pos: usize) -> Vec<usize> {
        let mut y = vec![0; neg];
        y.extend(std::iter::repeat_n(1, pos));
        y
    }

    #[test]
    fn split_preserves_proportions_and_covers_rows() {
        let y = labels(30, 70);
        let split = stratified_train_test_split(&y, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
        let test_pos = split.test.iter().filter(|&&i| y[i] == 1).count();
        assert_eq!(test_pos, 14);
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
        assert!(split.train.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn split_is_deterministic_per_seed() {
        let y = labels(25, 41);
        let a = stratified_train_test_split(&y, 0.2, 42).unwrap();
        let b = stratified_train_test_split(&y, 0.2, 42).unwrap();
        assert_eq!(a, b);
        // ceil(66 * 0.2) = 14 test rows.
        assert_eq!(a.test.len(), 14);
    }

    #[test]
    fn remainder_goes_to_largest_fraction() {
        // exact shares: 1.5 and 2.5 of n_test = 4 -> tie, first class wins.
        assert_eq!(allocate_test_counts(&[3, 5], 4, 8), vec![2, 2]);
        assert_eq!(allocate_test_counts(&[2, 8], 3, 10), vec![1, 2]);
    }

    #[test]
    fn split_rejects_singleton_class_and_bad_fraction() {
        assert_eq!(
            stratified_train_test_split(&labels(5, 1), 0.2, 1),
            Err(SplitError::ClassTooSmall { class: 1, count: 1 })
        );
        assert_eq!(
            stratified_train_test_split(&labels(5, 5), 1.5, 1),
            Err(SplitError::InvalidFraction(1.5))
        );
        assert_eq!(stratified_train_test_split(&[], 0.2, 1), Err(SplitError::Empty));
    }

    #[test]
    fn k_fold_matches_sorted_stride_allocation() {
        // 4 negatives then 6 positives, k = 2 -> each fold gets 2 neg and 3 pos.
        let y = vec![1, 0, 1, 1, 0, 1, 0, 1, 0, 1];
        let folds = stratified_k_fold(&y, 2).unwrap();
        assert_eq!(folds.len(), 2);
        assert_eq!(folds[0].test, vec![0, 1, 2, 3, 4]);
        assert_eq!(folds[1].test, vec![5, 6, 7, 8, 9]);
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), y.len());
        }
    }

    #[test]
    fn k_fold_uneven_classes() {
        let y = labels(3, 7);
        let folds = stratified_k_fold(&y, 5).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert_eq!(sizes, vec![2, 2, 2, 2, 2]);
        // Negatives land in the first three folds, one each.
        assert_eq!(folds[0].test, vec![0, 3]);
        assert_eq!(folds[3].test, vec![6, 7]);
    }

    #[test]
    fn k_fold_errors() {
        assert_eq!(stratified_k_fold(&labels(2, 2), 1), Err(SplitError::TooFewFolds(1)));
        assert_eq!(
            stratified_k_fold(&labels(2, 2), 3),
            Err(SplitError::TooManyFolds { folds: 3 })
        );
    }
}
