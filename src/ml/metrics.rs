//! Evaluation metrics for classification models.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Confusion matrix for a `K`-class classifier.
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Tally aligned truth/prediction pairs.
    pub fn from_predictions(n_classes: usize, truth: &[usize], predicted: &[usize]) -> Self {
        let mut cm = Self::new(n_classes);
        for (&t, &p) in truth.iter().zip(predicted) {
            cm.add(t, p);
        }
        cm
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&v| u64::from(v)).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Precision/recall statistics for a single class.
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f64,
    /// `TP / (TP + FN)`.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Total number of true examples for the class.
    pub support: u32,
}

/// Compute per-class precision, recall and F1 from a confusion matrix.
pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = f64::from(cm.get(class_idx, class_idx));
        let mut fp = 0f64;
        let mut fn_ = 0f64;
        let mut support = 0u32;
        for j in 0..k {
            let v = cm.get(class_idx, j);
            support = support.saturating_add(v);
            if j != class_idx {
                fn_ += f64::from(v);
            }
        }
        for i in 0..k {
            if i != class_idx {
                fp += f64::from(cm.get(i, class_idx));
            }
        }
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        stats.push(PerClassStats {
            precision,
            recall,
            f1: f1_score(precision, recall),
            support,
        });
    }
    stats
}

/// Compute overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    let correct: u64 = (0..cm.n_classes).map(|i| u64::from(cm.get(i, i))).sum();
    ratio(correct as f64, cm.total() as f64)
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    ratio(2.0 * precision * recall, precision + recall)
}

/// Scores for the positive class (label 1) of a binary task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `TN / (TN + FP)`.
    pub specificity: f64,
    /// `FP / (FP + TN)`.
    pub false_positive_rate: f64,
    pub true_negatives: u32,
    pub false_positives: u32,
    pub false_negatives: u32,
    pub true_positives: u32,
}

impl BinaryMetrics {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let (tn, fp, fn_, tp) = if cm.n_classes >= 2 {
            (cm.get(0, 0), cm.get(0, 1), cm.get(1, 0), cm.get(1, 1))
        } else {
            (0, 0, 0, 0)
        };
        let precision = ratio(f64::from(tp), f64::from(tp + fp));
        let recall = ratio(f64::from(tp), f64::from(tp + fn_));
        Self {
            accuracy: accuracy(cm),
            precision,
            recall,
            f1: f1_score(precision, recall),
            specificity: ratio(f64::from(tn), f64::from(tn + fp)),
            false_positive_rate: ratio(f64::from(fp), f64::from(fp + tn)),
            true_negatives: tn,
            false_positives: fp,
            false_negatives: fn_,
            true_positives: tp,
        }
    }

    pub fn from_predictions(truth: &[usize], predicted: &[usize]) -> Self {
        Self::from_confusion(&ConfusionMatrix::from_predictions(2, truth, predicted))
    }
}

/// One point of a ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
    /// Scores `>= threshold` are predicted positive; infinite for the origin.
    pub threshold: f64,
}

/// ROC points at every distinct score, from `(0, 0)` to `(1, 1)`.
///
/// Returns `None` unless both classes are present.
pub fn roc_curve(truth: &[usize], scores: &[f64]) -> Option<Vec<RocPoint>> {
    let positives = truth.iter().filter(|&&t| t == 1).count();
    let negatives = truth.len() - positives;
    if positives == 0 || negatives == 0 || truth.len() != scores.len() {
        return None;
    }
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = vec![RocPoint {
        fpr: 0.0,
        tpr: 0.0,
        threshold: f64::INFINITY,
    }];
    let (mut tp, mut fp) = (0usize, 0usize);
    for (pos, &idx) in order.iter().enumerate() {
        if truth[idx] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_threshold = order
            .get(pos + 1)
            .is_none_or(|&next| scores[next] != scores[idx]);
        if last_of_threshold {
            points.push(RocPoint {
                fpr: fp as f64 / negatives as f64,
                tpr: tp as f64 / positives as f64,
                threshold: scores[idx],
            });
        }
    }
    Some(points)
}

/// Area under the ROC curve via the rank-sum statistic; ties count half.
pub fn roc_auc(truth: &[usize], scores: &[f64]) -> Option<f64> {
    let positives = truth.iter().filter(|&&t| t == 1).count();
    let negatives = truth.len() - positives;
    if positives == 0 || negatives == 0 || truth.len() != scores.len() {
        return None;
    }
    let ranks = average_ranks(scores);
    let rank_sum: f64 = truth
        .iter()
        .zip(&ranks)
        .filter(|(t, _)| **t == 1)
        .map(|(_, r)| r)
        .sum();
    let p = positives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

/// 1-based ranks with ties sharing their average rank.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

fn averaged(stats: &[PerClassStats], weighted: bool) -> (f64, f64, f64) {
    let weight = |s: &PerClassStats| if weighted { f64::from(s.support) } else { 1.0 };
    let total: f64 = stats.iter().map(weight).sum();
    let mean = |f: fn(&PerClassStats) -> f64| {
        ratio(stats.iter().map(|s| f(s) * weight(s)).sum(), total)
    };
    (mean(|s| s.precision), mean(|s| s.recall), mean(|s| s.f1))
}

/// Plain-text per-class report with accuracy and averages.
pub fn classification_report(cm: &ConfusionMatrix, class_names: &[&str]) -> String {
    let stats = precision_recall_by_class(cm);
    let width = class_names
        .iter()
        .map(|n| n.len())
        .chain(std::iter::once("weighted avg".len()))
        .max()
        .unwrap_or(12);
    let total: u32 = stats.iter().map(|s| s.support).sum();

    let mut out = format!(
        "{:>width$}  {:>9} {:>9} {:>9} {:>9}\n\n",
        "", "precision", "recall", "f1-score", "support"
    );
    for (idx, stat) in stats.iter().enumerate() {
        let name = class_names
            .get(idx)
            .map(|n| n.to_string())
            .unwrap_or_else(|| idx.to_string());
        out.push_str(&format!(
            "{name:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
            stat.precision, stat.recall, stat.f1, stat.support
        ));
    }
    out.push('\n');
    out.push_str(&format!(
        "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}\n",
        "accuracy",
        "",
        "",
        accuracy(cm),
        total
    ));

    for (label, weighted) in [("macro avg", false), ("weighted avg", true)] {
        let (precision, recall, f1) = averaged(&stats, weighted);
        out.push_str(&format!(
            "{label:>width$}  {precision:>9.2} {recall:>9.2} {f1:>9.2} {total:>9}\n"
        ));
    }
    out
}
