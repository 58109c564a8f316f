use std::fmt::Write as _;

use super::PipelineError;
use crate::config::PipelineConfig;
use crate::dataset::export::{ensure_dir, write_prepared, write_text};
use crate::dataset::split::class_counts;
use crate::dataset::{
    FEATURE_NAMES, FeatureCategory, build_feature_table, load_incidents,
    stratified_train_test_split,
};

pub const PREPARATION_SUMMARY_FILE: &str = "01_data_preparation_summary.txt";

#[derive(Debug, Clone, PartialEq)]
pub struct PrepareOutcome {
    pub source_records: usize,
    pub aggregated_rows: usize,
    pub feature_rows: usize,
    pub dropped_non_finite: usize,
    pub regencies: usize,
    /// `(not at risk, at risk)` over all feature rows.
    pub class_counts: (usize, usize),
    pub train_counts: (usize, usize),
    pub test_counts: (usize, usize),
}

impl PrepareOutcome {
    pub fn train_rows(&self) -> usize {
        self.train_counts.0 + self.train_counts.1
    }

    pub fn test_rows(&self) -> usize {
        self.test_counts.0 + self.test_counts.1
    }
}

fn binary_counts(labels: &[usize]) -> (usize, usize) {
    let counts = class_counts(labels);
    (
        counts.first().copied().unwrap_or(0),
        counts.get(1).copied().unwrap_or(0),
    )
}

/// Engineer features, split them and write the prepared matrices.
pub fn prepare(config: &PipelineConfig) -> Result<PrepareOutcome, PipelineError> {
    let dir = &config.output.dir;
    ensure_dir(dir)?;
    let table = load_incidents(&config.input.path, &config.input.columns)?;
    let features = build_feature_table(&table.records);
    let labels: Vec<usize> = features.rows.iter().map(|row| row.label()).collect();
    let split =
        stratified_train_test_split(&labels, config.split.test_fraction, config.split.seed)?;
    write_prepared(dir, &features, &split)?;

    let pick = |indices: &[usize]| -> Vec<usize> { indices.iter().map(|&i| labels[i]).collect() };
    let outcome = PrepareOutcome {
        source_records: table.records.len(),
        aggregated_rows: features.aggregated_rows,
        feature_rows: features.rows.len(),
        dropped_non_finite: features.dropped_non_finite,
        regencies: features.encoder.len(),
        class_counts: features.class_counts(),
        train_counts: binary_counts(&pick(&split.train)),
        test_counts: binary_counts(&pick(&split.test)),
    };
    write_text(&dir.join(PREPARATION_SUMMARY_FILE), &render_summary(&outcome))?;
    tracing::info!(
        "Prepare stage: {} feature rows, {} train / {} test",
        outcome.feature_rows,
        outcome.train_rows(),
        outcome.test_rows()
    );
    Ok(outcome)
}

fn share(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn render_summary(outcome: &PrepareOutcome) -> String {
    let rule = "=".repeat(70);
    let mut out = String::new();
    let _ = writeln!(out, "DATA PREPARATION SUMMARY\n{rule}\n");
    let _ = writeln!(out, "SOURCE DATA:");
    let _ = writeln!(out, "- Total records: {}", outcome.source_records);
    let _ = writeln!(out, "- After aggregation: {}", outcome.aggregated_rows);
    let _ = writeln!(out, "- After cleaning: {}", outcome.feature_rows);
    let _ = writeln!(out, "- Regencies encoded: {}\n", outcome.regencies);

    let _ = writeln!(out, "FEATURE ENGINEERING:");
    let _ = writeln!(out, "{} features:", FEATURE_NAMES.len());
    for category in FeatureCategory::ALL {
        let names: Vec<&str> = FEATURE_NAMES
            .iter()
            .copied()
            .filter(|name| FeatureCategory::of(name) == Some(category))
            .collect();
        let _ = writeln!(out, "  - {} ({}): {}", category.label(), names.len(), names.join(", "));
    }

    let (neg, pos) = outcome.class_counts;
    let total = neg + pos;
    let _ = writeln!(out, "\nTARGET VARIABLE:");
    let _ = writeln!(out, "- Binary classification: At risk (1) vs Not at risk (0)");
    let _ = writeln!(out, "- Class 0: {neg} samples ({:.2}%)", share(neg, total));
    let _ = writeln!(out, "- Class 1: {pos} samples ({:.2}%)", share(pos, total));
    if pos > 0 {
        let _ = writeln!(out, "- Imbalance ratio: {:.2}:1", neg as f64 / pos as f64);
    }

    let _ = writeln!(out, "\nDATA SPLIT:");
    for (name, (neg, pos)) in [("Training", outcome.train_counts), ("Testing", outcome.test_counts)] {
        let n = neg + pos;
        let _ = writeln!(out, "- {name}: {n} samples ({:.1}%)", share(n, total));
        let _ = writeln!(out, "    Class 0: {neg} ({:.2}%)", share(neg, n));
        let _ = writeln!(out, "    Class 1: {pos} ({:.2}%)", share(pos, n));
    }
    if outcome.dropped_non_finite > 0 {
        let _ = writeln!(
            out,
            "\n{} rows were dropped for non-finite feature values.",
            outcome.dropped_non_finite
        );
    }
    out
}
