//! Cross validation, grid search and the five-way model comparison.

use serde::{Deserialize, Serialize};

use super::baseline::MajorityBaseline;
use super::forest::{ForestOptions, train_random_forest};
use super::metrics::{BinaryMetrics, roc_auc, roc_curve};
use super::model::TrainedModel;
use super::parallel::map_ordered;
use super::tree::{ClassWeight, MaxFeatures, TreeOptions, train_decision_tree};
use crate::config::{ForestConfig, GridConfig};
use crate::dataset::export::CsvRecord;
use crate::dataset::split::{select, stratified_k_fold};

pub const BASELINE: &str = "Baseline";
pub const DT_BASIC: &str = "DT Basic";
pub const DT_BALANCED: &str = "DT Balanced";
pub const DT_PRUNED: &str = "DT Pruned";
pub const RANDOM_FOREST: &str = "Random Forest";

/// Seed shared by every single-tree candidate.
const TREE_SEED: u64 = 42;

/// Per-fold F1 scores with their mean and population standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct CvScore {
    pub scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CvScore {
    fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let var = scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n;
        Self {
            scores,
            mean,
            std: var.sqrt(),
        }
    }
}

/// Stratified k-fold F1 of the models produced by `fit`.
pub fn cross_val_f1<F>(x: &[Vec<f64>], y: &[usize], folds: usize, fit: F) -> Result<CvScore, String>
where
    F: Fn(&[Vec<f64>], &[usize]) -> Result<TrainedModel, String>,
{
    let partitions = stratified_k_fold(y, folds).map_err(|err| err.to_string())?;
    let mut scores = Vec::with_capacity(partitions.len());
    for fold in &partitions {
        let model = fit(&select(x, &fold.train), &select(y, &fold.train))?;
        let predicted: Vec<usize> = fold.test.iter().map(|&i| model.predict(&x[i])).collect();
        let truth = select(y, &fold.test);
        scores.push(BinaryMetrics::from_predictions(&truth, &predicted).f1);
    }
    Ok(CvScore::from_scores(scores))
}

/// One hyperparameter combination of the pruned tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPoint {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl GridPoint {
    pub fn tree_options(&self) -> TreeOptions {
        TreeOptions {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            class_weight: ClassWeight::Balanced,
            max_features: MaxFeatures::All,
            seed: TREE_SEED,
        }
    }
}

impl std::fmt::Display for GridPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let depth = self
            .max_depth
            .map_or_else(|| "None".to_string(), |d| d.to_string());
        write!(
            f,
            "max_depth={depth}, min_samples_split={}, min_samples_leaf={}",
            self.min_samples_split, self.min_samples_leaf
        )
    }
}

/// Grid points in search order: depth, then leaf size, then split size.
pub fn grid_points(grid: &GridConfig) -> Vec<GridPoint> {
    let mut points = Vec::new();
    for max_depth in grid.depth_candidates() {
        for &min_samples_leaf in &grid.min_samples_leaf {
            for &min_samples_split in &grid.min_samples_split {
                points.push(GridPoint {
                    max_depth,
                    min_samples_split,
                    min_samples_leaf,
                });
            }
        }
    }
    points
}

#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best: GridPoint,
    pub best_score: CvScore,
    /// Every evaluated point in search order.
    pub results: Vec<(GridPoint, CvScore)>,
}

/// Exhaustive CV search over balanced trees; the first best point wins.
pub fn grid_search(
    x: &[Vec<f64>],
    y: &[usize],
    grid: &GridConfig,
    folds: usize,
) -> Result<GridSearchResult, String> {
    let points = grid_points(grid);
    if points.is_empty() {
        return Err("Hyperparameter grid is empty".to_string());
    }
    tracing::info!(
        "Grid search over {} candidates with {folds}-fold CV",
        points.len()
    );
    let scores = map_ordered(points.clone(), |point| {
        let options = point.tree_options();
        cross_val_f1(x, y, folds, |fx, fy| {
            train_decision_tree(fx, fy, &options).map(TrainedModel::DecisionTree)
        })
    })?;
    let results: Vec<(GridPoint, CvScore)> = points.into_iter().zip(scores).collect();

    let mut best_idx = 0;
    for (idx, (_, score)) in results.iter().enumerate() {
        if score.mean > results[best_idx].1.mean {
            best_idx = idx;
        }
    }
    let (best, best_score) = results[best_idx].clone();
    tracing::info!("Best grid point: {best} (CV F1 {:.4})", best_score.mean);
    Ok(GridSearchResult {
        best,
        best_score,
        results,
    })
}

/// Test-set scores of one candidate, one row of `model_comparison_metrics.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub model: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub roc_auc: Option<f64>,
    pub tree_depth: Option<usize>,
    pub n_leaves: Option<usize>,
    pub cv_f1_mean: Option<f64>,
    pub cv_f1_std: Option<f64>,
}

impl CsvRecord for ModelScore {
    const COLUMNS: &'static [&'static str] = &[
        "model",
        "accuracy",
        "precision",
        "recall",
        "f1_score",
        "roc_auc",
        "tree_depth",
        "n_leaves",
        "cv_f1_mean",
        "cv_f1_std",
    ];
}

/// One row of `feature_importance.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportanceRow {
    pub feature: String,
    pub importance: f64,
}

impl CsvRecord for FeatureImportanceRow {
    const COLUMNS: &'static [&'static str] = &["feature", "importance"];
}

/// Pair names with importances, highest first; ties keep feature order.
pub fn importance_rows(feature_names: &[&str], importances: &[f64]) -> Vec<FeatureImportanceRow> {
    let mut rows: Vec<FeatureImportanceRow> = feature_names
        .iter()
        .zip(importances)
        .map(|(name, &importance)| FeatureImportanceRow {
            feature: name.to_string(),
            importance,
        })
        .collect();
    rows.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    rows
}

/// One test row of `predictions_best_model.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub actual: u8,
    pub predicted: u8,
    pub probability_class_1: f64,
}

impl CsvRecord for PredictionRow {
    const COLUMNS: &'static [&'static str] = &["actual", "predicted", "probability_class_1"];
}

/// One ROC point of `roc_curves.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocRow {
    pub model: String,
    pub fpr: f64,
    pub tpr: f64,
}

impl CsvRecord for RocRow {
    const COLUMNS: &'static [&'static str] = &["model", "fpr", "tpr"];
}

/// A fitted candidate with its test-set outputs.
#[derive(Debug, Clone)]
pub struct CandidateModel {
    pub model: TrainedModel,
    pub predictions: Vec<usize>,
    /// Probability of the positive class per test row.
    pub probabilities: Vec<f64>,
    pub score: ModelScore,
}

#[derive(Debug, Clone)]
pub struct ComparisonOutcome {
    /// Baseline, DT Basic, DT Balanced, DT Pruned, Random Forest.
    pub candidates: Vec<CandidateModel>,
    pub grid: GridSearchResult,
    pub best_index: usize,
}

impl ComparisonOutcome {
    pub fn best(&self) -> &CandidateModel {
        &self.candidates[self.best_index]
    }

    pub fn scores(&self) -> Vec<ModelScore> {
        self.candidates.iter().map(|c| c.score.clone()).collect()
    }

    /// Test-set predictions of the best candidate against `y_test`.
    pub fn prediction_rows(&self, y_test: &[usize]) -> Vec<PredictionRow> {
        let best = self.best();
        y_test
            .iter()
            .zip(&best.predictions)
            .zip(&best.probabilities)
            .map(|((&actual, &predicted), &probability)| PredictionRow {
                actual: u8::from(actual == 1),
                predicted: u8::from(predicted == 1),
                probability_class_1: probability,
            })
            .collect()
    }

    /// ROC points of every candidate that reports an AUC.
    pub fn roc_rows(&self, y_test: &[usize]) -> Vec<RocRow> {
        let mut rows = Vec::new();
        for candidate in self.candidates.iter().filter(|c| c.score.roc_auc.is_some()) {
            let Some(curve) = roc_curve(y_test, &candidate.probabilities) else {
                continue;
            };
            rows.extend(curve.into_iter().map(|point| RocRow {
                model: candidate.score.model.clone(),
                fpr: point.fpr,
                tpr: point.tpr,
            }));
        }
        rows
    }
}

/// Index of the highest F1, first on ties.
pub fn best_by_f1(scores: &[ModelScore]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, score) in scores.iter().enumerate() {
        if best.is_none_or(|b| score.f1_score > scores[b].f1_score) {
            best = Some(idx);
        }
    }
    best
}

pub fn forest_options(config: &ForestConfig) -> ForestOptions {
    ForestOptions {
        n_trees: config.n_trees,
        max_depth: Some(config.max_depth),
        min_samples_split: config.min_samples_split,
        min_samples_leaf: config.min_samples_leaf,
        class_weight: if config.balanced {
            ClassWeight::Balanced
        } else {
            ClassWeight::Uniform
        },
        seed: config.seed,
    }
}

pub struct TrainTestData<'a> {
    pub x_train: &'a [Vec<f64>],
    pub y_train: &'a [usize],
    pub x_test: &'a [Vec<f64>],
    pub y_test: &'a [usize],
}

fn evaluate(
    name: &str,
    model: TrainedModel,
    data: &TrainTestData<'_>,
    cv: Option<&CvScore>,
) -> CandidateModel {
    let predictions: Vec<usize> = data.x_test.iter().map(|row| model.predict(row)).collect();
    let probabilities: Vec<f64> = data
        .x_test
        .iter()
        .map(|row| model.positive_probability(row))
        .collect();
    let metrics = BinaryMetrics::from_predictions(data.y_test, &predictions);
    let roc_auc = match &model {
        TrainedModel::Baseline(_) => None,
        _ => roc_auc(data.y_test, &probabilities),
    };
    let tree = model.as_tree();
    let score = ModelScore {
        model: name.to_string(),
        accuracy: metrics.accuracy,
        precision: metrics.precision,
        recall: metrics.recall,
        f1_score: metrics.f1,
        roc_auc,
        tree_depth: tree.map(|t| t.depth()),
        n_leaves: tree.map(|t| t.n_leaves()),
        cv_f1_mean: cv.map(|s| s.mean),
        cv_f1_std: cv.map(|s| s.std),
    };
    tracing::info!(
        "{name}: accuracy {:.4}, precision {:.4}, recall {:.4}, F1 {:.4}",
        score.accuracy,
        score.precision,
        score.recall,
        score.f1_score
    );
    CandidateModel {
        model,
        predictions,
        probabilities,
        score,
    }
}

/// Fit and score every candidate, then pick the best by test F1.
pub fn compare_models(
    data: &TrainTestData<'_>,
    grid: &GridConfig,
    forest: &ForestConfig,
    folds: usize,
) -> Result<ComparisonOutcome, String> {
    let mut candidates = Vec::with_capacity(5);

    let baseline = MajorityBaseline::fit(data.y_train)?;
    candidates.push(evaluate(
        BASELINE,
        TrainedModel::Baseline(baseline),
        data,
        None,
    ));

    let fit_tree = |options: TreeOptions| {
        move |fx: &[Vec<f64>], fy: &[usize]| {
            train_decision_tree(fx, fy, &options).map(TrainedModel::DecisionTree)
        }
    };

    let basic = TreeOptions {
        seed: TREE_SEED,
        ..TreeOptions::default()
    };
    let basic_cv = cross_val_f1(data.x_train, data.y_train, folds, fit_tree(basic.clone()))?;
    let model = fit_tree(basic)(data.x_train, data.y_train)?;
    candidates.push(evaluate(DT_BASIC, model, data, Some(&basic_cv)));

    let balanced = TreeOptions {
        class_weight: ClassWeight::Balanced,
        seed: TREE_SEED,
        ..TreeOptions::default()
    };
    let balanced_cv =
        cross_val_f1(data.x_train, data.y_train, folds, fit_tree(balanced.clone()))?;
    let model = fit_tree(balanced)(data.x_train, data.y_train)?;
    candidates.push(evaluate(DT_BALANCED, model, data, Some(&balanced_cv)));

    let grid_result = grid_search(data.x_train, data.y_train, grid, folds)?;
    let model = fit_tree(grid_result.best.tree_options())(data.x_train, data.y_train)?;
    candidates.push(evaluate(
        DT_PRUNED,
        model,
        data,
        Some(&grid_result.best_score),
    ));

    let options = forest_options(forest);
    let forest_cv = cross_val_f1(data.x_train, data.y_train, folds, |fx, fy| {
        train_random_forest(fx, fy, &options).map(TrainedModel::RandomForest)
    })?;
    let model = TrainedModel::RandomForest(train_random_forest(
        data.x_train,
        data.y_train,
        &options,
    )?);
    candidates.push(evaluate(RANDOM_FOREST, model, data, Some(&forest_cv)));

    let scores: Vec<ModelScore> = candidates.iter().map(|c| c.score.clone()).collect();
    let best_index = best_by_f1(&scores).ok_or_else(|| "No candidates were trained".to_string())?;
    tracing::info!(
        "Best model: {} (F1 {:.4})",
        scores[best_index].model,
        scores[best_index].f1_score
    );
    Ok(ComparisonOutcome {
        candidates,
        grid: grid_result,
        best_index,
    })
}
