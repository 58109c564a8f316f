use std::path::{Path, PathBuf};

use serde::Serialize;

use super::PipelineError;
use crate::dataset::FEATURE_NAMES;
use crate::dataset::export::{CsvRecord, ensure_dir, read_features, write_rows};
use crate::ml::ModelArtifact;

/// One scored row written by [`predict`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredFeatureRow {
    pub row: usize,
    pub predicted: u8,
    pub probability_class_1: f64,
}

impl CsvRecord for ScoredFeatureRow {
    const COLUMNS: &'static [&'static str] = &["row", "predicted", "probability_class_1"];
}

#[derive(Debug, Clone)]
pub struct PredictOutcome {
    pub model_name: String,
    pub rows: Vec<ScoredFeatureRow>,
    pub output: PathBuf,
}

impl PredictOutcome {
    pub fn at_risk(&self) -> usize {
        self.rows.iter().filter(|r| r.predicted == 1).count()
    }
}

/// Score every row of a features CSV with a saved model.
pub fn predict(
    model_path: &Path,
    features_path: &Path,
    output_path: &Path,
) -> Result<PredictOutcome, PipelineError> {
    let artifact = ModelArtifact::load_json(model_path).map_err(PipelineError::Model)?;
    if artifact.feature_names != FEATURE_NAMES {
        return Err(PipelineError::Model(format!(
            "{} was trained on different feature columns",
            model_path.display()
        )));
    }
    let features = read_features(features_path)?;
    let rows: Vec<ScoredFeatureRow> = features
        .iter()
        .enumerate()
        .map(|(row, features)| {
            let values = features.to_vec();
            ScoredFeatureRow {
                row,
                predicted: u8::from(artifact.model.predict(&values) == 1),
                probability_class_1: artifact.model.positive_probability(&values),
            }
        })
        .collect();
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    write_rows(output_path, &rows)?;
    tracing::info!(
        "Scored {} rows with {} into {}",
        rows.len(),
        artifact.model_name,
        output_path.display()
    );
    Ok(PredictOutcome {
        model_name: artifact.model_name,
        rows,
        output: output_path.to_path_buf(),
    })
}
