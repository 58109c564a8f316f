use rand::seq::SliceRandom;
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::model::{DecisionTreeModel, Split, TreeNode};

/// Distinct feature values closer than this are treated as equal.
const FEATURE_EPSILON: f64 = 1e-7;
const IMPURITY_EPSILON: f64 = 1e-12;

/// Per-class sample weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    #[default]
    Uniform,
    /// `n / (k * n_c)` for each class `c` present in the labels.
    Balanced,
}

/// Number of features examined at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    #[default]
    All,
    /// `floor(sqrt(d))`, at least one.
    Sqrt,
}

/// Training hyperparameters for a single tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeOptions {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub class_weight: ClassWeight,
    pub max_features: MaxFeatures,
    pub seed: u64,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            class_weight: ClassWeight::Uniform,
            max_features: MaxFeatures::All,
            seed: 42,
        }
    }
}

impl TreeOptions {
    fn check(&self) -> Result<(), String> {
        if self.min_samples_split < 2 {
            return Err("min_samples_split must be >= 2".to_string());
        }
        if self.min_samples_leaf == 0 {
            return Err("min_samples_leaf must be >= 1".to_string());
        }
        if self.max_depth == Some(0) {
            return Err("max_depth must be positive".to_string());
        }
        Ok(())
    }
}

/// Per-class weights for `y`; classes absent from `y` get weight 0.
pub fn class_weights(y: &[usize], n_classes: usize, mode: ClassWeight) -> Vec<f64> {
    match mode {
        ClassWeight::Uniform => vec![1.0; n_classes],
        ClassWeight::Balanced => {
            let mut counts = vec![0usize; n_classes];
            for &label in y {
                if label < n_classes {
                    counts[label] += 1;
                }
            }
            let present = counts.iter().filter(|&&c| c > 0).count().max(1);
            counts
                .iter()
                .map(|&c| {
                    if c == 0 {
                        0.0
                    } else {
                        y.len() as f64 / (present * c) as f64
                    }
                })
                .collect()
        }
    }
}

pub(crate) fn n_classes_for(y: &[usize]) -> usize {
    y.iter().copied().max().map_or(2, |max| (max + 1).max(2))
}

/// Fit a CART tree on `x`/`y` with the configured class weighting.
pub fn train_decision_tree(
    x: &[Vec<f64>],
    y: &[usize],
    options: &TreeOptions,
) -> Result<DecisionTreeModel, String> {
    let n_classes = n_classes_for(y);
    let weights = class_weights(y, n_classes, options.class_weight);
    let sample_weight: Vec<f64> = y.iter().map(|&label| weights[label]).collect();
    fit_weighted(x, y, &sample_weight, n_classes, options)
}

/// Fit a tree with explicit per-row weights; rows with zero weight are skipped.
pub(crate) fn fit_weighted(
    x: &[Vec<f64>],
    y: &[usize],
    sample_weight: &[f64],
    n_classes: usize,
    options: &TreeOptions,
) -> Result<DecisionTreeModel, String> {
    if x.len() != y.len() || x.len() != sample_weight.len() {
        return Err("Mismatched X/Y lengths".to_string());
    }
    if x.is_empty() {
        return Err("Empty dataset".to_string());
    }
    options.check()?;
    let n_features = x[0].len();
    if n_features == 0 {
        return Err("Feature vectors are empty".to_string());
    }
    if x.iter().any(|row| row.len() != n_features) {
        return Err("Feature vectors have inconsistent lengths".to_string());
    }
    if y.iter().any(|&label| label >= n_classes) {
        return Err(format!("Labels must be below {n_classes}"));
    }

    let rows: Vec<usize> = (0..x.len()).filter(|&i| sample_weight[i] > 0.0).collect();
    if rows.is_empty() {
        return Err("All sample weights are zero".to_string());
    }

    let mut builder = Builder {
        x,
        y,
        weight: sample_weight,
        n_classes,
        n_features,
        options,
        rng: StdRng::seed_from_u64(options.seed),
        nodes: Vec::new(),
        importances: vec![0.0; n_features],
    };
    builder.grow(rows, 0);

    let total: f64 = builder.importances.iter().sum();
    let feature_importances = if total > 0.0 {
        builder.importances.iter().map(|v| v / total).collect()
    } else {
        vec![0.0; n_features]
    };
    Ok(DecisionTreeModel {
        model_version: 1,
        n_features,
        n_classes,
        nodes: builder.nodes,
        feature_importances,
    })
}

struct Builder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    weight: &'a [f64],
    n_classes: usize,
    n_features: usize,
    options: &'a TreeOptions,
    rng: StdRng,
    nodes: Vec<TreeNode>,
    importances: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    threshold: f64,
    /// Weighted sum of child impurities, lower is better.
    child_impurity: f64,
}

impl Builder<'_> {
    fn class_totals(&self, rows: &[usize]) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_classes];
        for &row in rows {
            totals[self.y[row]] += self.weight[row];
        }
        totals
    }

    /// Add the subtree for `rows` and return its node index.
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let value = self.class_totals(&rows);
        let weighted: f64 = value.iter().sum();
        let impurity = gini(&value, weighted);
        let idx = self.nodes.len();
        self.nodes.push(TreeNode {
            split: None,
            value,
            samples: rows.len(),
            impurity,
        });

        let opts = self.options;
        let can_split = opts.max_depth.is_none_or(|max| depth < max)
            && rows.len() >= opts.min_samples_split
            && rows.len() >= 2 * opts.min_samples_leaf
            && impurity > IMPURITY_EPSILON;
        if !can_split {
            return idx;
        }
        let Some(best) = self.best_split(&rows) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&row| self.x[row][best.feature] <= best.threshold);
        self.importances[best.feature] += weighted * impurity - best.child_impurity;

        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx].split = Some(Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        });
        idx
    }

    fn feature_order(&mut self) -> (Vec<usize>, usize) {
        let mut order: Vec<usize> = (0..self.n_features).collect();
        match self.options.max_features {
            MaxFeatures::All => (order, self.n_features),
            MaxFeatures::Sqrt => {
                order.shuffle(&mut self.rng);
                let budget = ((self.n_features as f64).sqrt().floor() as usize).max(1);
                (order, budget)
            }
        }
    }

    fn best_split(&mut self, rows: &[usize]) -> Option<Candidate> {
        let (order, budget) = self.feature_order();
        let mut best: Option<Candidate> = None;
        let mut visited = 0usize;
        let mut sorted = rows.to_vec();
        for feature in order {
            if visited >= budget {
                break;
            }
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));
            let first = self.x[sorted[0]][feature];
            let last = self.x[sorted[sorted.len() - 1]][feature];
            if last <= first + FEATURE_EPSILON {
                // Constant features do not use up the budget.
                continue;
            }
            visited += 1;
            if let Some(candidate) = self.best_threshold(&sorted, feature) {
                let better = best.is_none_or(|b| candidate.child_impurity < b.child_impurity);
                if better {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn best_threshold(&self, sorted: &[usize], feature: usize) -> Option<Candidate> {
        let min_leaf = self.options.min_samples_leaf;
        let n = sorted.len();
        let total = self.class_totals(sorted);
        let total_weight: f64 = total.iter().sum();
        let mut left = vec![0.0; self.n_classes];
        let mut best: Option<Candidate> = None;

        for pos in 0..n - 1 {
            let row = sorted[pos];
            left[self.y[row]] += self.weight[row];
            let left_count = pos + 1;
            let right_count = n - left_count;
            if left_count < min_leaf {
                continue;
            }
            if right_count < min_leaf {
                break;
            }
            let current = self.x[row][feature];
            let next = self.x[sorted[pos + 1]][feature];
            if next <= current + FEATURE_EPSILON {
                continue;
            }

            let left_weight: f64 = left.iter().sum();
            let right: Vec<f64> = total.iter().zip(&left).map(|(t, l)| t - l).collect();
            let right_weight = total_weight - left_weight;
            let child_impurity =
                left_weight * gini(&left, left_weight) + right_weight * gini(&right, right_weight);
            if best.is_none_or(|b| child_impurity < b.child_impurity) {
                let mut threshold = (current + next) / 2.0;
                if threshold >= next {
                    threshold = current;
                }
                best = Some(Candidate {
                    feature,
                    threshold,
                    child_impurity,
                });
            }
        }
        best
    }
}

fn gini(totals: &[f64], weight: f64) -> f64 {
    if weight <= 0.0 {
        return 0.0;
    }
    1.0 - totals.iter().map(|t| (t / weight) * (t / weight)).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<usize>) {
        let x = vec![
            vec![1.0, 5.0],
            vec![2.0, 5.0],
            vec![3.0, 5.0],
            vec![10.0, 5.0],
            vec![11.0, 5.0],
            vec![12.0, 5.0],
        ];
        (x, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn splits_separable_data_at_midpoint() {
        let (x, y) = separable();
        let tree = train_decision_tree(&x, &y, &TreeOptions::default()).unwrap();
        assert_eq!(tree.n_nodes(), 3);
        let split = tree.nodes[0].split.unwrap();
        assert_eq!(split.feature, 0);
        assert_eq!(split.threshold, 6.5);
        assert_eq!(tree.feature_importances, vec![1.0, 0.0]);
        for (row, &label) in x.iter().zip(&y) {
            assert_eq!(tree.predict(row), label);
        }
        tree.validate().unwrap();
    }

    #[test]
    fn pure_labels_give_single_leaf() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        let tree = train_decision_tree(&x, &[1, 1, 1], &TreeOptions::default()).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.feature_importances, vec![0.0]);
        assert_eq!(tree.predict_proba(&[5.0]), vec![0.0, 1.0]);
    }

    #[test]
    fn depth_and_leaf_limits_hold() {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 7) as f64]).collect();
        let y: Vec<usize> = (0..40).map(|i| usize::from(i % 3 == 0)).collect();
        let options = TreeOptions {
            max_depth: Some(2),
            min_samples_leaf: 5,
            ..TreeOptions::default()
        };
        let tree = train_decision_tree(&x, &y, &options).unwrap();
        assert!(tree.depth() <= 2);
        assert!(tree.nodes.iter().filter(|n| n.is_leaf()).all(|n| n.samples >= 5));
    }

    #[test]
    fn balanced_weights_follow_class_share() {
        let weights = class_weights(&[0, 0, 0, 1], 2, ClassWeight::Balanced);
        assert!((weights[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((weights[1] - 2.0).abs() < 1e-12);
        assert_eq!(class_weights(&[0, 1], 2, ClassWeight::Uniform), vec![1.0, 1.0]);
    }

    #[test]
    fn balanced_leaf_probabilities_use_weights() {
        let x = vec![vec![0.0]; 6];
        let options = TreeOptions {
            class_weight: ClassWeight::Balanced,
            ..TreeOptions::default()
        };
        let tree = train_decision_tree(&x, &[0, 0, 0, 0, 1, 1], &options).unwrap();
        // Constant feature: no split, weighted totals are 3.0 vs 3.0.
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict_proba(&[0.0]), vec![0.5, 0.5]);
        assert_eq!(tree.predict(&[0.0]), 0);
    }

    #[test]
    fn sqrt_features_are_seeded() {
        let x: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![i as f64, ((i * 7) % 11) as f64, ((i * 3) % 5) as f64, 1.0])
            .collect();
        let y: Vec<usize> = (0..30).map(|i| usize::from(i % 4 == 1)).collect();
        let options = TreeOptions {
            max_features: MaxFeatures::Sqrt,
            seed: 9,
            ..TreeOptions::default()
        };
        let a = train_decision_tree(&x, &y, &options).unwrap();
        let b = train_decision_tree(&x, &y, &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(train_decision_tree(&[], &[], &TreeOptions::default()).is_err());
        let options = TreeOptions {
            min_samples_split: 1,
            ..TreeOptions::default()
        };
        assert!(train_decision_tree(&[vec![1.0]], &[0], &options).is_err());
        assert!(train_decision_tree(&[vec![1.0], vec![]], &[0, 1], &TreeOptions::default()).is_err());
    }
}
