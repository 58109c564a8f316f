//! Evaluation of the selected model and the business-facing reports built on it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use super::stats::{percent, quantile, round_to};
use crate::config::SuccessCriteria;
use crate::dataset::export::{CsvRecord, ExportError, write_rows, write_text};
use crate::dataset::{FeatureCategory, Features, RegencyEncoder};
use crate::ml::metrics::{BinaryMetrics, ConfusionMatrix};
use crate::ml::selection::{BASELINE, FeatureImportanceRow, ModelScore, PredictionRow, best_by_f1};

pub const RISK_MAPPING_FILE: &str = "geographic_risk_mapping.csv";
pub const RECOMMENDATIONS_FILE: &str = "02_business_recommendations.txt";
pub const EVALUATION_REPORT_FILE: &str = "03_evaluation_report.txt";
pub const VALIDATION_CHECKLIST_FILE: &str = "04_project_validation_checklist.txt";
pub const SUMMARY_STATISTICS_FILE: &str = "06_project_summary_statistics.csv";

const TOP_FEATURES: usize = 10;
const TOP_ERROR_REGENCIES: usize = 5;
const CUMULATIVE_IMPORTANCE: f64 = 0.80;
/// Largest allowed gap between the train and test at-risk percentages.
const MAX_SPLIT_SHARE_GAP: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Good,
    Fair,
    Poor,
}

impl Grade {
    pub fn precision(value: f64) -> Self {
        Self::grade(value, 0.70, 0.60)
    }

    pub fn recall(value: f64) -> Self {
        Self::grade(value, 0.70, 0.50)
    }

    fn grade(value: f64, good: f64, fair: f64) -> Self {
        if value >= good {
            Self::Good
        } else if value >= fair {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "GOOD",
            Self::Fair => "FAIR",
            Self::Poor => "POOR",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CriterionCheck {
    pub name: &'static str,
    pub threshold: f64,
    /// `None` when the model does not report the metric.
    pub value: Option<f64>,
    pub passed: bool,
}

/// Compare the selected model's scores with the configured minimums.
pub fn check_criteria(score: &ModelScore, criteria: &SuccessCriteria) -> Vec<CriterionCheck> {
    let check = |name, threshold: f64, value: Option<f64>| CriterionCheck {
        name,
        threshold,
        value,
        passed: value.is_some_and(|v| v >= threshold),
    };
    vec![
        check("precision", criteria.min_precision, Some(score.precision)),
        check("recall", criteria.min_recall, Some(score.recall)),
        check("f1_score", criteria.min_f1, Some(score.f1_score)),
        check("roc_auc", criteria.min_roc_auc, score.roc_auc),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceSummary {
    pub top: Vec<FeatureImportanceRow>,
    /// Features needed to explain about 80% of the importance mass.
    pub features_for_80pct: usize,
    pub category_shares: Vec<(FeatureCategory, f64)>,
}

/// `rows` must be sorted by importance, highest first.
pub fn summarize_importance(rows: &[FeatureImportanceRow]) -> ImportanceSummary {
    let mut cumulative = 0.0;
    let mut within = 0;
    for row in rows {
        cumulative += row.importance;
        if cumulative <= CUMULATIVE_IMPORTANCE {
            within += 1;
        }
    }
    let temporal = category_sum(rows, FeatureCategory::Temporal);
    let geographic = category_sum(rows, FeatureCategory::Geographic);
    let total: f64 = rows.iter().map(|r| r.importance).sum();
    ImportanceSummary {
        top: rows.iter().take(TOP_FEATURES).cloned().collect(),
        features_for_80pct: (within + 1).min(rows.len()),
        category_shares: vec![
            (FeatureCategory::Temporal, temporal),
            (FeatureCategory::Geographic, geographic),
            (FeatureCategory::Statistical, total - temporal - geographic),
        ],
    }
}

fn category_sum(rows: &[FeatureImportanceRow], category: FeatureCategory) -> f64 {
    rows.iter()
        .filter(|r| FeatureCategory::of(&r.feature) == Some(category))
        .map(|r| r.importance)
        .sum()
}

/// Misclassified test rows of one kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorGroup {
    pub count: usize,
    /// Most affected regencies, highest count first.
    pub top_regencies: Vec<(String, usize)>,
    /// Distinct regencies in test-row order.
    pub regencies: Vec<String>,
    pub mean_lag_1y: Option<f64>,
    pub mean_probability: Option<f64>,
}

impl ErrorGroup {
    fn from_rows(rows: &[&ScoredRow<'_>]) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut seen = BTreeSet::new();
        let mut regencies = Vec::new();
        for row in rows {
            *counts.entry(row.regency).or_insert(0) += 1;
            if seen.insert(row.regency) {
                regencies.push(row.regency.to_string());
            }
        }
        let mut top: Vec<(String, usize)> =
            counts.into_iter().map(|(name, n)| (name.to_string(), n)).collect();
        top.sort_by(|a, b| b.1.cmp(&a.1));
        top.truncate(TOP_ERROR_REGENCIES);

        let n = rows.len() as f64;
        Self {
            count: rows.len(),
            top_regencies: top,
            regencies,
            mean_lag_1y: (!rows.is_empty())
                .then(|| rows.iter().map(|r| r.features.cases_lag_1y).sum::<f64>() / n),
            mean_probability: (!rows.is_empty())
                .then(|| rows.iter().map(|r| r.prediction.probability_class_1).sum::<f64>() / n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    /// Bins `(0,30]`, `(30,50]`, `(50,70]`, `(70,100]`; anything else is unrated.
    pub fn from_score(score: f64) -> Option<Self> {
        if score <= 0.0 || score > 100.0 {
            None
        } else if score <= 30.0 {
            Some(Self::Low)
        } else if score <= 50.0 {
            Some(Self::Medium)
        } else if score <= 70.0 {
            Some(Self::High)
        } else {
            Some(Self::VeryHigh)
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "Very High",
        }
    }
}

fn serialize_level<S: Serializer>(level: &Option<RiskLevel>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(level.map_or("", RiskLevel::label))
}

/// One row of `geographic_risk_mapping.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegencyRisk {
    pub regency: String,
    pub predicted_risk_count: usize,
    pub avg_risk_probability: f64,
    pub actual_risk_count: usize,
    pub risk_score: f64,
    #[serde(serialize_with = "serialize_level")]
    pub risk_level: Option<RiskLevel>,
}

impl CsvRecord for RegencyRisk {
    const COLUMNS: &'static [&'static str] = &[
        "regency",
        "predicted_risk_count",
        "avg_risk_probability",
        "actual_risk_count",
        "risk_score",
        "risk_level",
    ];
}

struct ScoredRow<'a> {
    regency: &'a str,
    features: &'a Features,
    prediction: &'a PredictionRow,
}

fn risk_mapping(rows: &[ScoredRow<'_>]) -> Vec<RegencyRisk> {
    #[derive(Default)]
    struct Acc {
        predicted: usize,
        actual: usize,
        probability: f64,
        n: usize,
    }
    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
    for row in rows {
        let acc = groups.entry(row.regency).or_default();
        acc.predicted += usize::from(row.prediction.predicted);
        acc.actual += usize::from(row.prediction.actual);
        acc.probability += row.prediction.probability_class_1;
        acc.n += 1;
    }
    let mut risks: Vec<RegencyRisk> = groups
        .into_iter()
        .map(|(regency, acc)| {
            let mean = acc.probability / acc.n as f64;
            let risk_score = round_to(mean * 100.0, 2);
            RegencyRisk {
                regency: regency.to_string(),
                predicted_risk_count: acc.predicted,
                avg_risk_probability: mean,
                actual_risk_count: acc.actual,
                risk_score,
                risk_level: RiskLevel::from_score(risk_score),
            }
        })
        .collect();
    risks.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
    risks
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendations {
    pub very_high: Vec<RegencyRisk>,
    pub high: Vec<RegencyRisk>,
    /// First distinct regencies with missed at-risk rows.
    pub missed_regencies: Vec<String>,
    /// 75th percentile of predicted probabilities.
    pub probability_threshold: Option<f64>,
    pub top_features: Vec<FeatureImportanceRow>,
}

/// Everything the evaluate stage needs, read back from earlier stages.
#[derive(Debug, Clone)]
pub struct EvaluationInputs {
    pub scores: Vec<ModelScore>,
    pub predictions: Vec<PredictionRow>,
    /// Sorted by importance, highest first.
    pub importance: Vec<FeatureImportanceRow>,
    pub x_test: Vec<Features>,
    pub encoder: RegencyEncoder,
    pub train_rows: usize,
    /// Label counts over train and test combined.
    pub class_counts: (usize, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub best: ModelScore,
    pub metrics: BinaryMetrics,
    pub precision_grade: Grade,
    pub recall_grade: Grade,
    pub criteria: Vec<CriterionCheck>,
    pub importance: ImportanceSummary,
    pub false_positives: ErrorGroup,
    pub false_negatives: ErrorGroup,
    pub risk_map: Vec<RegencyRisk>,
    pub recommendations: Recommendations,
    pub total_records: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub regencies: usize,
    pub period: Option<(i32, i32)>,
    pub imbalance_ratio: Option<f64>,
    /// `(not at risk, at risk)` over train and test combined.
    pub class_counts: (usize, usize),
    pub models_compared: usize,
}

impl Evaluation {
    pub fn high_risk_count(&self) -> usize {
        self.recommendations.very_high.len() + self.recommendations.high.len()
    }
}

/// Analyse the selected model's test predictions.
pub fn evaluate_predictions(
    inputs: &EvaluationInputs,
    criteria: &SuccessCriteria,
) -> Result<Evaluation, String> {
    let best_idx = best_by_f1(&inputs.scores).ok_or_else(|| "Model comparison is empty".to_string())?;
    let best = inputs.scores[best_idx].clone();
    if inputs.predictions.len() != inputs.x_test.len() {
        return Err(format!(
            "{} predictions do not match {} test rows",
            inputs.predictions.len(),
            inputs.x_test.len()
        ));
    }

    let mut scored = Vec::with_capacity(inputs.x_test.len());
    for (features, prediction) in inputs.x_test.iter().zip(&inputs.predictions) {
        let code = features.regency_code;
        let regency = (code >= 0.0 && code.fract() == 0.0)
            .then(|| inputs.encoder.decode(code as usize))
            .flatten()
            .ok_or_else(|| format!("Unknown regency code {code}"))?;
        scored.push(ScoredRow {
            regency,
            features,
            prediction,
        });
    }

    let truth: Vec<usize> = inputs.predictions.iter().map(|p| usize::from(p.actual)).collect();
    let predicted: Vec<usize> = inputs.predictions.iter().map(|p| usize::from(p.predicted)).collect();
    let metrics = BinaryMetrics::from_confusion(&ConfusionMatrix::from_predictions(2, &truth, &predicted));

    let fp_rows: Vec<&ScoredRow<'_>> = scored
        .iter()
        .filter(|r| r.prediction.actual == 0 && r.prediction.predicted == 1)
        .collect();
    let fn_rows: Vec<&ScoredRow<'_>> = scored
        .iter()
        .filter(|r| r.prediction.actual == 1 && r.prediction.predicted == 0)
        .collect();
    let false_positives = ErrorGroup::from_rows(&fp_rows);
    let false_negatives = ErrorGroup::from_rows(&fn_rows);

    let risk_map = risk_mapping(&scored);
    let importance = summarize_importance(&inputs.importance);

    let mut probabilities: Vec<f64> = inputs
        .predictions
        .iter()
        .map(|p| p.probability_class_1)
        .collect();
    probabilities.sort_by(f64::total_cmp);
    let recommendations = Recommendations {
        very_high: risk_map
            .iter()
            .filter(|r| r.risk_level == Some(RiskLevel::VeryHigh))
            .cloned()
            .collect(),
        high: risk_map
            .iter()
            .filter(|r| r.risk_level == Some(RiskLevel::High))
            .cloned()
            .collect(),
        missed_regencies: false_negatives.regencies.iter().take(5).cloned().collect(),
        probability_threshold: quantile(&probabilities, 0.75),
        top_features: inputs.importance.iter().take(5).cloned().collect(),
    };

    let years = inputs.x_test.iter().map(|f| f.year as i32);
    let period = years.clone().min().zip(years.max());
    let (negatives, positives) = inputs.class_counts;
    tracing::info!(
        "Evaluating {}: {} false positives, {} false negatives",
        best.model,
        false_positives.count,
        false_negatives.count
    );
    Ok(Evaluation {
        precision_grade: Grade::precision(metrics.precision),
        recall_grade: Grade::recall(metrics.recall),
        criteria: check_criteria(&best, criteria),
        best,
        metrics,
        importance,
        false_positives,
        false_negatives,
        risk_map,
        recommendations,
        total_records: negatives + positives,
        train_rows: inputs.train_rows,
        test_rows: inputs.x_test.len(),
        regencies: inputs.encoder.len(),
        period,
        imbalance_ratio: (positives > 0).then(|| negatives as f64 / positives as f64),
        class_counts: inputs.class_counts,
        models_compared: inputs.scores.len(),
    })
}

fn fmt_option(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.decimals$}"))
}

fn ratio_label(ratio: Option<f64>) -> String {
    ratio.map_or_else(|| "n/a".to_string(), |r| format!("{r:.1}:1"))
}

fn write_error_group(out: &mut String, title: &str, group: &ErrorGroup) {
    let _ = writeln!(out, "\n[{title}]");
    let _ = writeln!(out, "Total: {} rows", group.count);
    if group.count == 0 {
        return;
    }
    let _ = writeln!(out, "Most affected regencies:");
    for (regency, count) in &group.top_regencies {
        let _ = writeln!(out, "  - {regency}: {count}");
    }
    let _ = writeln!(out, "Mean cases one year earlier: {}", fmt_option(group.mean_lag_1y, 2));
    let _ = writeln!(
        out,
        "Mean predicted probability: {}",
        fmt_option(group.mean_probability.map(|p| p * 100.0), 2)
    );
}

/// Confusion breakdown, criteria, importance and error analysis.
pub fn render_evaluation_report(evaluation: &Evaluation) -> String {
    let rule = "=".repeat(70);
    let sub = "=".repeat(50);
    let m = &evaluation.metrics;
    let best = &evaluation.best;
    let mut out = String::new();
    let _ = writeln!(out, "{rule}\nMODEL EVALUATION REPORT\n{rule}\n");
    let _ = writeln!(out, "Best model: {}", best.model);
    let _ = writeln!(out, "  Accuracy:  {:.4}", best.accuracy);
    let _ = writeln!(out, "  Precision: {:.4}", best.precision);
    let _ = writeln!(out, "  Recall:    {:.4}", best.recall);
    let _ = writeln!(out, "  F1-Score:  {:.4}", best.f1_score);
    let _ = writeln!(out, "  ROC-AUC:   {}", fmt_option(best.roc_auc, 4));

    let _ = writeln!(out, "\nCONFUSION MATRIX\n{sub}");
    let _ = writeln!(out, "True Negatives (TN):  {:4}", m.true_negatives);
    let _ = writeln!(out, "False Positives (FP): {:4}", m.false_positives);
    let _ = writeln!(out, "False Negatives (FN): {:4}", m.false_negatives);
    let _ = writeln!(out, "True Positives (TP):  {:4}", m.true_positives);
    let _ = writeln!(out, "Accuracy:             {:.4}", m.accuracy);
    let _ = writeln!(out, "Precision:            {:.4} ({})", m.precision, evaluation.precision_grade.label());
    let _ = writeln!(out, "Recall:               {:.4} ({})", m.recall, evaluation.recall_grade.label());
    let _ = writeln!(out, "Specificity:          {:.4}", m.specificity);
    let _ = writeln!(out, "False Positive Rate:  {:.4}", m.false_positive_rate);

    let _ = writeln!(out, "\nSUCCESS CRITERIA\n{sub}");
    for check in &evaluation.criteria {
        let _ = writeln!(
            out,
            "{:<10} >= {:.2}: {:<8} {}",
            check.name,
            check.threshold,
            fmt_option(check.value, 4),
            if check.passed { "PASS" } else { "FAIL" }
        );
    }

    let importance = &evaluation.importance;
    let _ = writeln!(out, "\nFEATURE IMPORTANCE\n{sub}");
    for (idx, row) in importance.top.iter().enumerate() {
        let _ = writeln!(out, "{:2}. {:<25} : {:.4}", idx + 1, row.feature, row.importance);
    }
    let _ = writeln!(
        out,
        "Top {} features explain ~80% of model decisions",
        importance.features_for_80pct
    );
    for (category, share) in &importance.category_shares {
        let _ = writeln!(out, "  {:<12} {:.2}%", category.label(), share * 100.0);
    }

    write_error_group(&mut out, "FALSE POSITIVES", &evaluation.false_positives);
    write_error_group(&mut out, "FALSE NEGATIVES", &evaluation.false_negatives);

    let _ = writeln!(out, "\nGEOGRAPHIC RISK RANKING\n{sub}");
    for (idx, risk) in evaluation.risk_map.iter().take(5).enumerate() {
        let _ = writeln!(
            out,
            "{:2}. {:<30} Risk: {:.1}% ({})",
            idx + 1,
            risk.regency,
            risk.risk_score,
            risk.risk_level.map_or("unrated", RiskLevel::label)
        );
    }
    out
}

fn write_tier(out: &mut String, tier: &[RegencyRisk], action: &str, empty: &str) {
    if tier.is_empty() {
        let _ = writeln!(out, "  {empty}");
        return;
    }
    for risk in tier {
        let _ = writeln!(out, "  - {}", risk.regency);
        let _ = writeln!(out, "    Risk score: {:.1}%", risk.risk_score);
        let _ = writeln!(out, "    Predicted at-risk rows: {}", risk.predicted_risk_count);
        let _ = writeln!(out, "    Action: {action}");
    }
}

pub fn render_recommendations(evaluation: &Evaluation) -> String {
    let rule = "=".repeat(70);
    let sub = "=".repeat(50);
    let rec = &evaluation.recommendations;
    let mut out = String::new();
    let _ = writeln!(out, "{rule}\nBUSINESS RECOMMENDATIONS & ACTION PLAN\n{rule}\n");
    let _ = writeln!(out, "GEOGRAPHIC PRIORITIZATION\n{sub}\n");
    let _ = writeln!(out, "TIER 1: VERY HIGH RISK (immediate action)");
    write_tier(
        &mut out,
        &rec.very_high,
        "deploy a crisis intervention team",
        "No regency in the very high risk category",
    );
    let _ = writeln!(out, "\nTIER 2: HIGH RISK (enhanced monitoring)");
    write_tier(
        &mut out,
        &rec.high,
        "strengthen mental health services",
        "No regency in the high risk category",
    );

    let _ = writeln!(out, "\nKEY ACTIONABLE INSIGHTS\n{sub}");
    let _ = writeln!(
        out,
        "1. Focus resources on {} high-risk regencies",
        evaluation.high_risk_count()
    );
    let _ = writeln!(
        out,
        "2. Track the top {} predictive features",
        evaluation.importance.top.len()
    );
    let _ = writeln!(
        out,
        "3. {} at-risk rows were missed; verify manually:",
        evaluation.false_negatives.count
    );
    for regency in &rec.missed_regencies {
        let _ = writeln!(out, "     - {regency}");
    }
    let _ = writeln!(
        out,
        "4. {} false alarms; use probability threshold {}",
        evaluation.false_positives.count,
        fmt_option(rec.probability_threshold, 2)
    );
    let _ = writeln!(out, "5. Feature-based prevention, focus on:");
    for (idx, row) in rec.top_features.iter().enumerate() {
        let _ = writeln!(
            out,
            "     {}. {} (importance: {:.3})",
            idx + 1,
            row.feature,
            row.importance
        );
    }

    let best = &evaluation.best;
    let _ = writeln!(out, "\nMODEL PERFORMANCE SUMMARY\n{sub}");
    let _ = writeln!(out, "Best model: {}", best.model);
    let _ = writeln!(out, "Accuracy:  {:.2}%", best.accuracy * 100.0);
    let _ = writeln!(out, "Precision: {:.2}%", best.precision * 100.0);
    let _ = writeln!(out, "Recall:    {:.2}%", best.recall * 100.0);
    let _ = writeln!(out, "F1-Score:  {:.3}", best.f1_score);
    let _ = writeln!(out, "ROC-AUC:   {}", fmt_option(best.roc_auc, 3));
    let _ = writeln!(
        out,
        "\n{} high-risk areas out of {} regencies.",
        evaluation.high_risk_count(),
        evaluation.risk_map.len()
    );
    out
}

#[derive(Debug, Serialize)]
struct SummaryStatisticRow {
    metric: &'static str,
    value: String,
}

impl CsvRecord for SummaryStatisticRow {
    const COLUMNS: &'static [&'static str] = &["metric", "value"];
}

pub fn summary_statistics(evaluation: &Evaluation) -> Vec<(&'static str, String)> {
    let best = &evaluation.best;
    let m = &evaluation.metrics;
    let period = evaluation.period.map_or_else(
        || "n/a".to_string(),
        |(lo, hi)| format!("{} ({lo}-{hi})", hi - lo + 1),
    );
    vec![
        ("Total Records", evaluation.total_records.to_string()),
        ("Total Regencies", evaluation.regencies.to_string()),
        ("Period (Years)", period),
        ("Training Samples", evaluation.train_rows.to_string()),
        ("Testing Samples", evaluation.test_rows.to_string()),
        ("Engineered Features", crate::dataset::FEATURE_COUNT.to_string()),
        ("Models Compared", evaluation.models_compared.to_string()),
        ("Best Model", best.model.clone()),
        ("Accuracy", format!("{:.2}%", best.accuracy * 100.0)),
        ("Precision", format!("{:.2}%", best.precision * 100.0)),
        ("Recall", format!("{:.2}%", best.recall * 100.0)),
        ("F1-Score", format!("{:.4}", best.f1_score)),
        ("ROC-AUC", fmt_option(best.roc_auc, 4)),
        ("True Positives", m.true_positives.to_string()),
        ("True Negatives", m.true_negatives.to_string()),
        ("False Positives", m.false_positives.to_string()),
        ("False Negatives", m.false_negatives.to_string()),
        ("High-Risk Areas", evaluation.high_risk_count().to_string()),
        (
            "Top Predictive Feature",
            evaluation
                .importance
                .top
                .first()
                .map_or_else(|| "n/a".to_string(), |r| r.feature.clone()),
        ),
        ("Class Imbalance Ratio", ratio_label(evaluation.imbalance_ratio)),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistItem {
    pub phase: &'static str,
    pub label: String,
    pub passed: bool,
}

/// Check the run against its criteria, its class balance and the files in `dir`.
pub fn validation_checklist(
    evaluation: &Evaluation,
    dir: &Path,
    artifacts: &[&str],
) -> Vec<ChecklistItem> {
    let mut items = Vec::new();
    let mut push = |phase, label: String, passed| {
        items.push(ChecklistItem {
            phase,
            label,
            passed,
        })
    };

    push(
        "DATA PREPARATION",
        format!("{} regency-year rows processed", evaluation.total_records),
        evaluation.total_records > 0,
    );
    push(
        "DATA PREPARATION",
        format!("{} regencies encoded", evaluation.regencies),
        evaluation.regencies > 0,
    );
    push(
        "DATA PREPARATION",
        format!(
            "Train-test split: {} train / {} test rows",
            evaluation.train_rows, evaluation.test_rows
        ),
        evaluation.train_rows > 0 && evaluation.test_rows > 0,
    );

    let (negatives, positives) = evaluation.class_counts;
    push(
        "CLASS BALANCE",
        format!("Both classes present ({negatives} not at risk, {positives} at risk)"),
        negatives > 0 && positives > 0,
    );
    let m = &evaluation.metrics;
    let test_positives = (m.true_positives + m.false_negatives) as usize;
    let train_share = percent(positives.saturating_sub(test_positives), evaluation.train_rows);
    let test_share = percent(test_positives, evaluation.test_rows);
    push(
        "CLASS BALANCE",
        format!("Stratified split keeps the at-risk share ({train_share:.1}% train, {test_share:.1}% test)"),
        (train_share - test_share).abs() <= MAX_SPLIT_SHARE_GAP,
    );

    push(
        "MODELING",
        format!("{} models compared", evaluation.models_compared),
        evaluation.models_compared > 1,
    );
    push(
        "MODELING",
        format!("Best model ({}) improves on the majority baseline", evaluation.best.model),
        evaluation.best.model != BASELINE,
    );

    for check in &evaluation.criteria {
        push(
            "EVALUATION",
            format!(
                "{} >= {:.2} ({})",
                check.name,
                check.threshold,
                fmt_option(check.value, 4)
            ),
            check.passed,
        );
    }

    for name in artifacts {
        push("ARTIFACTS", format!("{name} written"), dir.join(name).is_file());
    }
    items
}

pub fn render_validation_checklist(evaluation: &Evaluation, items: &[ChecklistItem]) -> String {
    let rule = "=".repeat(70);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}\nPROJECT VALIDATION CHECKLIST\n{rule}");
    let mut phase = "";
    for item in items {
        if item.phase != phase {
            phase = item.phase;
            let _ = writeln!(out, "\n{phase}");
        }
        let mark = if item.passed { "PASS" } else { "FAIL" };
        let _ = writeln!(out, "  [{mark}] {}", item.label);
    }

    let best = &evaluation.best;
    let _ = writeln!(out, "\nMODEL PERFORMANCE METRICS");
    let _ = writeln!(out, "  Accuracy:  {:.2}%", best.accuracy * 100.0);
    let _ = writeln!(out, "  Precision: {:.2}%", best.precision * 100.0);
    let _ = writeln!(out, "  Recall:    {:.2}%", best.recall * 100.0);
    let _ = writeln!(out, "  F1-Score:  {:.3}", best.f1_score);
    let _ = writeln!(out, "  ROC-AUC:   {}", fmt_option(best.roc_auc, 3));

    let m = &evaluation.metrics;
    let _ = writeln!(out, "\nERROR ANALYSIS");
    let _ = writeln!(out, "  True Positives:  {}", m.true_positives);
    let _ = writeln!(out, "  False Negatives: {} (missed at-risk rows)", m.false_negatives);
    let _ = writeln!(out, "  False Positives: {} (false alarms)", m.false_positives);
    let _ = writeln!(out, "  True Negatives:  {}", m.true_negatives);

    let rec = &evaluation.recommendations;
    let _ = writeln!(out, "\nGEOGRAPHIC INSIGHTS");
    let _ = writeln!(out, "  Regencies scored: {}", evaluation.risk_map.len());
    let _ = writeln!(out, "  Very High Risk:   {}", rec.very_high.len());
    let _ = writeln!(out, "  High Risk:        {}", rec.high.len());
    let _ = writeln!(
        out,
        "  Top Risk Area:    {}",
        evaluation.risk_map.first().map_or("n/a", |r| r.regency.as_str())
    );

    let importance = &evaluation.importance;
    let _ = writeln!(out, "\nFEATURE INSIGHTS");
    let _ = writeln!(
        out,
        "  Top Feature:      {}",
        importance.top.first().map_or("n/a", |r| r.feature.as_str())
    );
    let _ = writeln!(out, "  Features for 80%: {}", importance.features_for_80pct);
    for (category, share) in &importance.category_shares {
        let _ = writeln!(out, "  {:<16}  {:.2}%", format!("{} weight:", category.label()), share * 100.0);
    }

    let failed = items.iter().filter(|item| !item.passed).count();
    if failed == 0 {
        let _ = writeln!(out, "\nPROJECT STATUS: ALL {} CHECKS PASSED", items.len());
    } else {
        let _ = writeln!(out, "\nPROJECT STATUS: {failed} OF {} CHECKS FAILED", items.len());
    }
    out
}

/// Write the risk map, reports, summary table and checklist into `dir`.
///
/// `artifacts` names earlier-stage files the checklist expects in `dir`.
pub fn write_evaluation(
    dir: &Path,
    evaluation: &Evaluation,
    artifacts: &[&str],
) -> Result<Vec<PathBuf>, ExportError> {
    let mapping_path = dir.join(RISK_MAPPING_FILE);
    write_rows(&mapping_path, &evaluation.risk_map)?;
    let recommendations_path = dir.join(RECOMMENDATIONS_FILE);
    write_text(&recommendations_path, &render_recommendations(evaluation))?;
    let report_path = dir.join(EVALUATION_REPORT_FILE);
    write_text(&report_path, &render_evaluation_report(evaluation))?;
    let rows: Vec<SummaryStatisticRow> = summary_statistics(evaluation)
        .into_iter()
        .map(|(metric, value)| SummaryStatisticRow { metric, value })
        .collect();
    let summary_path = dir.join(SUMMARY_STATISTICS_FILE);
    write_rows(&summary_path, &rows)?;

    let mut expected = artifacts.to_vec();
    expected.extend([
        RISK_MAPPING_FILE,
        RECOMMENDATIONS_FILE,
        EVALUATION_REPORT_FILE,
        SUMMARY_STATISTICS_FILE,
    ]);
    let items = validation_checklist(evaluation, dir, &expected);
    let failed = items.iter().filter(|item| !item.passed).count();
    if failed > 0 {
        tracing::warn!("{failed} of {} validation checks failed", items.len());
    }
    let checklist_path = dir.join(VALIDATION_CHECKLIST_FILE);
    write_text(&checklist_path, &render_validation_checklist(evaluation, &items))?;
    Ok(vec![
        mapping_path,
        recommendations_path,
        report_path,
        summary_path,
        checklist_path,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(code: f64, lag: f64) -> Features {
        Features {
            year: 2021.0,
            cases_lag_1y: lag,
            cases_lag_2y: 0.0,
            trend: 0.0,
            growth_rate: 0.0,
            rolling_mean_2y: 0.0,
            rolling_max_2y: 0.0,
            regency_code: code,
            district_count: 1.0,
            village_count: 1.0,
            cases_per_village: 0.0,
            density_score: 0.0,
            historical_total: 0.0,
            mean_cases: 0.0,
            max_cases: 0.0,
            std_cases: 0.0,
            severity_ratio: 0.0,
            record_count: 1.0,
        }
    }

    fn prediction(actual: u8, predicted: u8, p: f64) -> PredictionRow {
        PredictionRow {
            actual,
            predicted,
            probability_class_1: p,
        }
    }

    fn score(model: &str, f1: f64) -> ModelScore {
        ModelScore {
            model: model.to_string(),
            accuracy: 0.8,
            precision: 0.65,
            recall: 0.4,
            f1_score: f1,
            roc_auc: Some(0.75),
            tree_depth: None,
            n_leaves: None,
            cv_f1_mean: None,
            cv_f1_std: None,
        }
    }

    fn inputs() -> EvaluationInputs {
        EvaluationInputs {
            scores: vec![score("Baseline", 0.0), score("DT Pruned", 0.5)],
            predictions: vec![
                prediction(1, 1, 0.9),
                prediction(0, 1, 0.8),
                prediction(1, 0, 0.2),
                prediction(0, 0, 0.1),
                prediction(1, 0, 0.4),
            ],
            importance: vec![
                FeatureImportanceRow {
                    feature: "cases_lag_1y".into(),
                    importance: 0.5,
                },
                FeatureImportanceRow {
                    feature: "regency_code".into(),
                    importance: 0.25,
                },
                FeatureImportanceRow {
                    feature: "std_cases".into(),
                    importance: 0.25,
                },
            ],
            x_test: vec![
                features(0.0, 3.0),
                features(0.0, 1.0),
                features(1.0, 0.0),
                features(1.0, 0.0),
                features(2.0, 2.0),
            ],
            encoder: RegencyEncoder::fit(["BANDUNG", "BOGOR", "GARUT"]),
            train_rows: 20,
            class_counts: (15, 10),
        }
    }

    #[test]
    fn grades_follow_thresholds() {
        assert_eq!(Grade::precision(0.70), Grade::Good);
        assert_eq!(Grade::precision(0.65), Grade::Fair);
        assert_eq!(Grade::precision(0.59), Grade::Poor);
        assert_eq!(Grade::recall(0.50), Grade::Fair);
        assert_eq!(Grade::recall(0.49), Grade::Poor);
    }

    #[test]
    fn risk_levels_bin_scores() {
        assert_eq!(RiskLevel::from_score(0.0), None);
        assert_eq!(RiskLevel::from_score(30.0), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::from_score(30.01), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::from_score(70.0), Some(RiskLevel::High));
        assert_eq!(RiskLevel::from_score(85.0), Some(RiskLevel::VeryHigh));
    }

    #[test]
    fn eighty_percent_count_is_capped() {
        let rows = inputs().importance;
        let summary = summarize_importance(&rows);
        // Running sums 0.5 and 0.75 stay within the bound.
        assert_eq!(summary.features_for_80pct, 3);
        assert_eq!(summary.category_shares[0], (FeatureCategory::Temporal, 0.5));
        assert_eq!(summary.category_shares[1], (FeatureCategory::Geographic, 0.25));
        assert_eq!(summary.category_shares[2], (FeatureCategory::Statistical, 0.25));

        let dominant = vec![FeatureImportanceRow {
            feature: "year".into(),
            importance: 1.0,
        }];
        assert_eq!(summarize_importance(&dominant).features_for_80pct, 1);
    }

    #[test]
    fn evaluation_breaks_down_errors_by_regency() {
        let evaluation = evaluate_predictions(&inputs(), &SuccessCriteria::default()).unwrap();
        assert_eq!(evaluation.best.model, "DT Pruned");
        assert_eq!(evaluation.metrics.true_positives, 1);
        assert_eq!(evaluation.metrics.false_positives, 1);
        assert_eq!(evaluation.metrics.false_negatives, 2);
        assert_eq!(evaluation.metrics.true_negatives, 1);

        assert_eq!(evaluation.false_positives.top_regencies, vec![("BANDUNG".to_string(), 1)]);
        assert_eq!(evaluation.false_positives.mean_lag_1y, Some(1.0));
        assert_eq!(evaluation.false_negatives.regencies, vec!["BOGOR", "GARUT"]);
        assert!((evaluation.false_negatives.mean_probability.unwrap() - 0.3).abs() < 1e-12);

        let first = &evaluation.risk_map[0];
        assert_eq!(first.regency, "BANDUNG");
        assert_eq!(first.risk_score, 85.0);
        assert_eq!(first.risk_level, Some(RiskLevel::VeryHigh));
        assert_eq!(first.predicted_risk_count, 2);
        assert_eq!(first.actual_risk_count, 1);
        assert_eq!(evaluation.risk_map[1].regency, "GARUT");
        assert_eq!(evaluation.risk_map[2].risk_score, 15.0);

        assert_eq!(evaluation.recommendations.very_high.len(), 1);
        assert_eq!(evaluation.recommendations.probability_threshold, Some(0.8));
        assert!((evaluation.imbalance_ratio.unwrap() - 1.5).abs() < 1e-12);

        let checks: Vec<bool> = evaluation.criteria.iter().map(|c| c.passed).collect();
        assert_eq!(checks, vec![true, false, false, true]);
    }

    #[test]
    fn unknown_regency_code_is_rejected() {
        let mut inputs = inputs();
        inputs.x_test[0].regency_code = 9.0;
        assert!(evaluate_predictions(&inputs, &SuccessCriteria::default()).is_err());
    }

    #[test]
    fn writes_reports() {
        let dir = tempfile::tempdir().unwrap();
        let evaluation = evaluate_predictions(&inputs(), &SuccessCriteria::default()).unwrap();
        let written = write_evaluation(dir.path(), &evaluation, &[]).unwrap();
        assert_eq!(written.len(), 5);
        let mapping = std::fs::read_to_string(dir.path().join(RISK_MAPPING_FILE)).unwrap();
        assert!(mapping.starts_with(
            "regency,predicted_risk_count,avg_risk_probability,actual_risk_count,risk_score,risk_level"
        ));
        assert!(mapping.contains("Very High"));
        let summary = std::fs::read_to_string(dir.path().join(SUMMARY_STATISTICS_FILE)).unwrap();
        assert!(summary.contains("Best Model,DT Pruned"));
        assert!(summary.contains("Class Imbalance Ratio,1.5:1"));
        let recommendations =
            std::fs::read_to_string(dir.path().join(RECOMMENDATIONS_FILE)).unwrap();
        assert!(recommendations.contains("BANDUNG"));
        let checklist =
            std::fs::read_to_string(dir.path().join(VALIDATION_CHECKLIST_FILE)).unwrap();
        assert!(checklist.contains("[PASS] 03_evaluation_report.txt written"));
    }

    #[test]
    fn row_columns_match_serialized_fields() {
        use crate::dataset::export::derived_header;

        let evaluation = evaluate_predictions(&inputs(), &SuccessCriteria::default()).unwrap();
        assert_eq!(derived_header(&evaluation.risk_map[0]), RegencyRisk::COLUMNS.join(","));
        let row = SummaryStatisticRow {
            metric: "Best Model",
            value: "DT Pruned".into(),
        };
        assert_eq!(derived_header(&row), SummaryStatisticRow::COLUMNS.join(","));
    }

    #[test]
    fn checklist_flags_failed_checks_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("X_train.csv"), "year\n").unwrap();
        let evaluation = evaluate_predictions(&inputs(), &SuccessCriteria::default()).unwrap();
        let items = validation_checklist(&evaluation, dir.path(), &["X_train.csv", "best_model.json"]);
        assert_eq!(items.len(), 13);

        let failed: Vec<&str> = items
            .iter()
            .filter(|item| !item.passed)
            .map(|item| item.label.as_str())
            .collect();
        // 35% at risk in train against 60% in test, then recall, F1 and the model file.
        assert_eq!(failed.len(), 4);
        assert!(failed[0].starts_with("Stratified split keeps the at-risk share (35.0% train, 60.0% test)"));
        assert!(failed[1].starts_with("recall"));
        assert!(failed[2].starts_with("f1_score"));
        assert_eq!(failed[3], "best_model.json written");
        assert!(items.iter().any(|item| item.label == "X_train.csv written" && item.passed));

        let text = render_validation_checklist(&evaluation, &items);
        assert!(text.contains("CLASS BALANCE\n  [PASS] Both classes present (15 not at risk, 10 at risk)"));
        assert!(text.contains("Top Risk Area:    BANDUNG"));
        assert!(text.contains("PROJECT STATUS: 4 OF 13 CHECKS FAILED"));
    }

    #[test]
    fn checklist_fails_single_class_runs() {
        let mut inputs = inputs();
        inputs.class_counts = (0, 25);
        inputs.scores = vec![score("Baseline", 1.0)];
        let evaluation = evaluate_predictions(&inputs, &SuccessCriteria::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let items = validation_checklist(&evaluation, dir.path(), &[]);
        let failed: Vec<&str> = items
            .iter()
            .filter(|item| !item.passed)
            .map(|item| item.label.as_str())
            .collect();
        assert!(failed.contains(&"Both classes present (0 not at risk, 25 at risk)"));
        assert!(failed.contains(&"1 models compared"));
        assert!(failed.contains(&"Best model (Baseline) improves on the majority baseline"));
    }
}
