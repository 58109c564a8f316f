use std::fmt::Write as _;
use std::path::PathBuf;

use super::PipelineError;
use crate::config::PipelineConfig;
use crate::dataset::export::{ensure_dir, load_prepared, write_rows, write_text};
use crate::dataset::{CLASS_NAMES, FEATURE_NAMES};
use crate::ml::ModelArtifact;
use crate::ml::metrics::{ConfusionMatrix, classification_report};
use crate::ml::selection::{
    GridPoint, ModelScore, TrainTestData, compare_models, importance_rows,
};

pub const COMPARISON_FILE: &str = "model_comparison_metrics.csv";
pub const IMPORTANCE_FILE: &str = "feature_importance.csv";
pub const PREDICTIONS_FILE: &str = "predictions_best_model.csv";
pub const ROC_FILE: &str = "roc_curves.csv";
pub const MODEL_FILE: &str = "best_model.json";
pub const MODEL_INFO_FILE: &str = "best_model_info.txt";
pub const CLASSIFICATION_REPORT_FILE: &str = "classification_report.txt";
pub const TREE_STRUCTURE_FILE: &str = "decision_tree_structure.txt";

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub scores: Vec<ModelScore>,
    pub best_model: String,
    pub grid_best: GridPoint,
    pub model_path: PathBuf,
    pub written: Vec<PathBuf>,
}

/// Train every candidate on the prepared split and persist the best one.
pub fn train(config: &PipelineConfig) -> Result<TrainOutcome, PipelineError> {
    let dir = &config.output.dir;
    ensure_dir(dir)?;
    let prepared = load_prepared(dir)?;
    let x_train = prepared.train_matrix();
    let x_test = prepared.test_matrix();
    let data = TrainTestData {
        x_train: &x_train,
        y_train: &prepared.y_train,
        x_test: &x_test,
        y_test: &prepared.y_test,
    };
    let outcome = compare_models(
        &data,
        &config.grid,
        &config.forest,
        config.cross_validation.folds,
    )
    .map_err(PipelineError::Model)?;
    let best = outcome.best();
    let scores = outcome.scores();
    let mut written = Vec::new();

    let path = dir.join(COMPARISON_FILE);
    write_rows(&path, &scores)?;
    written.push(path);

    let zeros = vec![0.0; FEATURE_NAMES.len()];
    let importances = best.model.feature_importances().unwrap_or(zeros.as_slice());
    let path = dir.join(IMPORTANCE_FILE);
    write_rows(&path, &importance_rows(&FEATURE_NAMES, importances))?;
    written.push(path);

    let path = dir.join(PREDICTIONS_FILE);
    write_rows(&path, &outcome.prediction_rows(&prepared.y_test))?;
    written.push(path);

    let path = dir.join(ROC_FILE);
    write_rows(&path, &outcome.roc_rows(&prepared.y_test))?;
    written.push(path);

    let artifact = ModelArtifact::new(&best.score.model, &FEATURE_NAMES, best.model.clone());
    let model_path = dir.join(MODEL_FILE);
    artifact.save_json(&model_path).map_err(PipelineError::Model)?;
    written.push(model_path.clone());

    let path = dir.join(MODEL_INFO_FILE);
    write_text(&path, &render_model_info(&best.score, &outcome.grid.best))?;
    written.push(path);

    let cm = ConfusionMatrix::from_predictions(2, &prepared.y_test, &best.predictions);
    let path = dir.join(CLASSIFICATION_REPORT_FILE);
    let report = format!(
        "Classification report - {}\n\n{}",
        best.score.model,
        classification_report(&cm, &CLASS_NAMES)
    );
    write_text(&path, &report)?;
    written.push(path);

    if let Some(tree) = best.model.as_tree() {
        let path = dir.join(TREE_STRUCTURE_FILE);
        write_text(&path, &tree.export_text(&FEATURE_NAMES))?;
        written.push(path);
    }

    tracing::info!("Train stage wrote {} files", written.len());
    Ok(TrainOutcome {
        best_model: best.score.model.clone(),
        scores,
        grid_best: outcome.grid.best,
        model_path,
        written,
    })
}

fn render_model_info(score: &ModelScore, grid_best: &GridPoint) -> String {
    let mut out = format!("BEST MODEL: {}\n{}\n\n", score.model, "=".repeat(50));
    let _ = writeln!(out, "best_model: {}", score.model);
    let _ = writeln!(out, "accuracy: {:.4}", score.accuracy);
    let _ = writeln!(out, "precision: {:.4}", score.precision);
    let _ = writeln!(out, "recall: {:.4}", score.recall);
    let _ = writeln!(out, "f1_score: {:.4}", score.f1_score);
    match score.roc_auc {
        Some(auc) => {
            let _ = writeln!(out, "roc_auc: {auc:.4}");
        }
        None => {
            let _ = writeln!(out, "roc_auc: n/a");
        }
    }
    if let (Some(depth), Some(leaves)) = (score.tree_depth, score.n_leaves) {
        let _ = writeln!(out, "tree_depth: {depth}");
        let _ = writeln!(out, "n_leaves: {leaves}");
    }
    let _ = writeln!(out, "grid_search_best: {grid_best}");
    out
}
