mod support;

use std::path::Path;

use regionrisk::analysis::explore::{DATASET_SUMMARY_FILE, HOTSPOTS_FILE, TEMPORAL_TRENDS_FILE};
use regionrisk::analysis::insights::{
    EVALUATION_REPORT_FILE, RECOMMENDATIONS_FILE, RISK_MAPPING_FILE, SUMMARY_STATISTICS_FILE,
    VALIDATION_CHECKLIST_FILE,
};
use regionrisk::config::{CONFIG_FILE_NAME, PipelineConfig};
use regionrisk::dataset::FEATURE_NAMES;
use regionrisk::dataset::export::{X_TEST_FILE, X_TRAIN_FILE, Y_TEST_FILE, Y_TRAIN_FILE};
use regionrisk::pipeline::{
    self, COMPARISON_FILE, IMPORTANCE_FILE, MODEL_FILE, PREDICTIONS_FILE, ROC_FILE,
};
use support::incidents::{REGENCIES, VILLAGES, YEARS, write_all_at_risk_csv, write_incident_csv};
use support::regionrisk_env::RegionriskEnvGuard;
use tempfile::tempdir;

fn small_config(input: &Path, out_dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default().with_overrides(
        Some(input.to_path_buf()),
        Some(out_dir.to_path_buf()),
    );
    config.grid.max_depth = vec![2, 3];
    config.grid.include_unlimited_depth = false;
    config.grid.min_samples_split = vec![2];
    config.grid.min_samples_leaf = vec![1, 2];
    config.cross_validation.folds = 3;
    config.forest.n_trees = 8;
    config
}

fn data_lines(path: &Path) -> usize {
    let text = std::fs::read_to_string(path).expect("read csv");
    text.lines().count().saturating_sub(1)
}

#[test]
fn full_run_writes_every_stage_artifact() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("incidents.csv");
    let records = write_incident_csv(&input);
    let out_dir = dir.path().join("output");
    let config = small_config(&input, &out_dir);

    let outcome = pipeline::run_all(&config).unwrap();

    let overview = &outcome.explore.exploration.overview;
    assert_eq!(overview.total_records, records);
    assert_eq!(overview.regencies, REGENCIES);
    assert_eq!(overview.year_min, *YEARS.start());
    assert_eq!(overview.year_max, *YEARS.end());

    let regency_years = REGENCIES * YEARS.count();
    assert_eq!(outcome.prepare.source_records, REGENCIES * YEARS.count() * VILLAGES);
    assert_eq!(outcome.prepare.aggregated_rows, regency_years);
    assert_eq!(
        outcome.prepare.train_rows() + outcome.prepare.test_rows(),
        outcome.prepare.feature_rows
    );
    assert_eq!(data_lines(&out_dir.join(X_TRAIN_FILE)), outcome.prepare.train_rows());
    assert_eq!(data_lines(&out_dir.join(Y_TRAIN_FILE)), outcome.prepare.train_rows());
    assert_eq!(data_lines(&out_dir.join(X_TEST_FILE)), outcome.prepare.test_rows());
    assert_eq!(data_lines(&out_dir.join(Y_TEST_FILE)), outcome.prepare.test_rows());

    assert_eq!(outcome.train.scores.len(), 5);
    assert_eq!(outcome.train.scores[0].model, "Baseline");
    assert!(outcome.train.scores[0].roc_auc.is_none());
    assert!(
        outcome
            .train
            .scores
            .iter()
            .any(|score| score.model == outcome.train.best_model)
    );
    assert_eq!(data_lines(&out_dir.join(COMPARISON_FILE)), 5);
    assert_eq!(data_lines(&out_dir.join(IMPORTANCE_FILE)), FEATURE_NAMES.len());
    assert_eq!(
        data_lines(&out_dir.join(PREDICTIONS_FILE)),
        outcome.prepare.test_rows()
    );
    assert!(outcome.train.model_path.is_file());

    let evaluation = &outcome.evaluate.evaluation;
    assert_eq!(evaluation.best.model, outcome.train.best_model);
    let m = &evaluation.metrics;
    assert_eq!(
        (m.true_negatives + m.false_positives + m.false_negatives + m.true_positives) as usize,
        outcome.prepare.test_rows()
    );
    assert_eq!(evaluation.criteria.len(), 4);

    for name in [
        DATASET_SUMMARY_FILE,
        TEMPORAL_TRENDS_FILE,
        HOTSPOTS_FILE,
        RISK_MAPPING_FILE,
        RECOMMENDATIONS_FILE,
        EVALUATION_REPORT_FILE,
        SUMMARY_STATISTICS_FILE,
        VALIDATION_CHECKLIST_FILE,
    ] {
        assert!(out_dir.join(name).is_file(), "missing {name}");
    }
    assert_eq!(data_lines(&out_dir.join(HOTSPOTS_FILE)), REGENCIES);
    assert_eq!(data_lines(&out_dir.join(TEMPORAL_TRENDS_FILE)), YEARS.count());
    assert_eq!(outcome.evaluate.written.len(), 5);

    let checklist = std::fs::read_to_string(out_dir.join(VALIDATION_CHECKLIST_FILE)).unwrap();
    for name in [X_TRAIN_FILE, MODEL_FILE, RISK_MAPPING_FILE, SUMMARY_STATISTICS_FILE] {
        assert!(checklist.contains(&format!("[PASS] {name} written")), "{name} not checked");
    }
    assert!(checklist.contains("[PASS] Both classes present"));
    assert!(checklist.contains("PROJECT STATUS:"));
}

#[test]
fn single_class_run_selects_baseline_with_zero_importances() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("incidents.csv");
    write_all_at_risk_csv(&input);
    let out_dir = dir.path().join("output");
    let config = small_config(&input, &out_dir);

    let outcome = pipeline::run_all(&config).unwrap();

    assert_eq!(outcome.prepare.class_counts.0, 0);
    assert_eq!(outcome.prepare.class_counts.1, outcome.prepare.feature_rows);
    assert_eq!(outcome.train.best_model, "Baseline");
    assert!(outcome.train.scores.iter().all(|score| score.roc_auc.is_none()));

    let importance = std::fs::read_to_string(out_dir.join(IMPORTANCE_FILE)).unwrap();
    let mut lines = importance.lines();
    assert_eq!(lines.next(), Some("feature,importance"));
    let values: Vec<f64> = lines
        .map(|line| line.rsplit(',').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(values.len(), FEATURE_NAMES.len());
    assert!(values.iter().all(|&value| value == 0.0));

    let roc = std::fs::read_to_string(out_dir.join(ROC_FILE)).unwrap();
    assert_eq!(roc.trim_end(), "model,fpr,tpr");

    let evaluation = &outcome.evaluate.evaluation;
    assert_eq!(evaluation.imbalance_ratio, Some(0.0));
    assert_eq!(evaluation.metrics.false_negatives, 0);
    let checklist = std::fs::read_to_string(out_dir.join(VALIDATION_CHECKLIST_FILE)).unwrap();
    assert!(checklist.contains("[FAIL] Both classes present (0 not at risk,"));
    assert!(checklist.contains("[FAIL] Best model (Baseline) improves on the majority baseline"));
}

#[test]
fn saved_model_scores_exported_test_features() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("incidents.csv");
    write_incident_csv(&input);
    let out_dir = dir.path().join("output");
    let config = small_config(&input, &out_dir);
    pipeline::run_all(&config).unwrap();

    let scored_path = dir.path().join("scored").join("predictions.csv");
    let outcome = pipeline::predict(
        &out_dir.join(MODEL_FILE),
        &out_dir.join(X_TEST_FILE),
        &scored_path,
    )
    .unwrap();

    assert_eq!(outcome.rows.len(), data_lines(&out_dir.join(X_TEST_FILE)));
    assert_eq!(data_lines(&scored_path), outcome.rows.len());
    assert!(
        outcome
            .rows
            .iter()
            .all(|row| (0.0..=1.0).contains(&row.probability_class_1))
    );
    assert!(outcome.at_risk() <= outcome.rows.len());
}

#[test]
fn train_before_prepare_reports_missing_split() {
    let dir = tempdir().unwrap();
    let config = small_config(&dir.path().join("unused.csv"), dir.path());
    assert!(pipeline::train(&config).is_err());
}

#[test]
fn resolve_reads_config_from_app_home() {
    let home = tempdir().unwrap();
    let _guard = RegionriskEnvGuard::set_home(home.path().to_path_buf());
    let app_dir = home.path().join(".regionrisk");
    std::fs::create_dir_all(&app_dir).unwrap();
    std::fs::write(
        app_dir.join(CONFIG_FILE_NAME),
        "[forest]\nn_trees = 12\n\n[output]\ndir = \"runs/latest\"\n",
    )
    .unwrap();

    let config = PipelineConfig::resolve(None).unwrap();
    assert_eq!(config.forest.n_trees, 12);
    assert_eq!(config.output.dir, Path::new("runs/latest"));
    assert_eq!(config.split, PipelineConfig::default().split);
}
