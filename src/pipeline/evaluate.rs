use std::path::PathBuf;

use super::PipelineError;
use super::train::{COMPARISON_FILE, IMPORTANCE_FILE, MODEL_FILE, PREDICTIONS_FILE};
use crate::analysis::{Evaluation, EvaluationInputs, evaluate_predictions, write_evaluation};
use crate::config::PipelineConfig;
use crate::dataset::export::{
    ENCODING_FILE, PROCESSED_FILE, X_TEST_FILE, X_TRAIN_FILE, Y_TEST_FILE, Y_TRAIN_FILE,
    ensure_dir, load_prepared, read_rows,
};
use crate::ml::selection::{FeatureImportanceRow, ModelScore, PredictionRow};

/// Prepare and train outputs the validation checklist expects.
const STAGE_ARTIFACTS: [&str; 10] = [
    X_TRAIN_FILE,
    X_TEST_FILE,
    Y_TRAIN_FILE,
    Y_TEST_FILE,
    PROCESSED_FILE,
    ENCODING_FILE,
    COMPARISON_FILE,
    IMPORTANCE_FILE,
    PREDICTIONS_FILE,
    MODEL_FILE,
];

#[derive(Debug)]
pub struct EvaluateOutcome {
    pub evaluation: Evaluation,
    pub written: Vec<PathBuf>,
}

/// Analyse the train stage outputs and write the business reports.
pub fn evaluate(config: &PipelineConfig) -> Result<EvaluateOutcome, PipelineError> {
    let dir = &config.output.dir;
    ensure_dir(dir)?;
    let scores: Vec<ModelScore> = read_rows(&dir.join(COMPARISON_FILE))?;
    let predictions: Vec<PredictionRow> = read_rows(&dir.join(PREDICTIONS_FILE))?;
    let mut importance: Vec<FeatureImportanceRow> = read_rows(&dir.join(IMPORTANCE_FILE))?;
    importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    let prepared = load_prepared(dir)?;

    let positives = prepared
        .y_train
        .iter()
        .chain(&prepared.y_test)
        .filter(|&&label| label == 1)
        .count();
    let total = prepared.y_train.len() + prepared.y_test.len();
    let inputs = EvaluationInputs {
        scores,
        predictions,
        importance,
        train_rows: prepared.x_train.len(),
        x_test: prepared.x_test,
        encoder: prepared.encoder,
        class_counts: (total - positives, positives),
    };
    let evaluation =
        evaluate_predictions(&inputs, &config.criteria).map_err(PipelineError::Analysis)?;
    let written = write_evaluation(dir, &evaluation, &STAGE_ARTIFACTS)?;
    tracing::info!("Evaluate stage wrote {} files", written.len());
    Ok(EvaluateOutcome {
        evaluation,
        written,
    })
}
