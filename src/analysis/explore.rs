//! Business and data understanding over the raw incident table.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::stats::{median, percent, quantile, round_to};
use crate::config::SuccessCriteria;
use crate::dataset::export::{CsvRecord, ExportError, write_rows, write_text};
use crate::dataset::{IncidentTable, MissingValueReport};

pub const TEMPORAL_TRENDS_FILE: &str = "temporal_trends.csv";
pub const HOTSPOTS_FILE: &str = "geographic_hotspots.csv";
pub const DATASET_SUMMARY_FILE: &str = "00_dataset_summary.csv";
pub const BUSINESS_SUMMARY_FILE: &str = "00_business_understanding_summary.txt";

const TOP_VALUE_COUNTS: usize = 15;
const TOP_HOTSPOTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetOverview {
    pub total_records: usize,
    pub year_min: i32,
    pub year_max: i32,
    pub distinct_years: usize,
    pub provinces: usize,
    pub regencies: usize,
    pub districts: usize,
    pub villages: usize,
    pub missing: MissingValueReport,
}

/// Pandas-style `describe()` of one numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl DescriptiveStats {
    pub fn of(values: &[f64]) -> Option<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        let min = *sorted.first()?;
        let max = *sorted.last()?;
        let mean = sorted.iter().sum::<f64>() / count as f64;
        Some(Self {
            count,
            mean,
            std: crate::dataset::aggregate::sample_std(&sorted, mean),
            min,
            q25: quantile(&sorted, 0.25)?,
            median: quantile(&sorted, 0.5)?,
            q75: quantile(&sorted, 0.75)?,
            max,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetSummary {
    pub stats: DescriptiveStats,
    /// `(value, count)`, most frequent first.
    pub top_values: Vec<(f64, usize)>,
    pub zero_count: usize,
    pub non_zero_count: usize,
    pub zero_pct: f64,
    pub non_zero_pct: f64,
    /// Zero rows per non-zero row; `None` without any cases.
    pub imbalance_ratio: Option<f64>,
    pub non_zero_median: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearTrend {
    pub year: i32,
    pub total_cases: f64,
    pub mean_cases: f64,
    pub record_count: usize,
    pub pct_with_cases: f64,
}

impl CsvRecord for YearTrend {
    const COLUMNS: &'static [&'static str] =
        &["year", "total_cases", "mean_cases", "record_count", "pct_with_cases"];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegencyHotspot {
    pub regency: String,
    pub total_cases: f64,
    pub mean_cases: f64,
    pub max_cases: f64,
    pub village_rows: usize,
    pub pct_with_cases: f64,
}

impl CsvRecord for RegencyHotspot {
    const COLUMNS: &'static [&'static str] = &[
        "regency",
        "total_cases",
        "mean_cases",
        "max_cases",
        "village_rows",
        "pct_with_cases",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Increasing,
    Decreasing,
}

impl Trend {
    pub fn label(self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExploreInsights {
    pub top_regencies: Vec<String>,
    /// Share of all cases in `top_regencies`, in percent.
    pub top_share_pct: f64,
    pub peak_year: i32,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exploration {
    pub overview: DatasetOverview,
    pub target: TargetSummary,
    pub temporal: Vec<YearTrend>,
    pub hotspots: Vec<RegencyHotspot>,
    pub insights: ExploreInsights,
}

/// Run every descriptive analysis; `None` for an empty table.
pub fn explore_incidents(table: &IncidentTable) -> Option<Exploration> {
    let records = &table.records;
    let incidents: Vec<f64> = records.iter().map(|r| r.incidents).collect();
    let stats = DescriptiveStats::of(&incidents)?;

    let years: BTreeSet<i32> = records.iter().map(|r| r.year).collect();
    let overview = DatasetOverview {
        total_records: records.len(),
        year_min: *years.first()?,
        year_max: *years.last()?,
        distinct_years: years.len(),
        provinces: distinct(records.iter().map(|r| r.province.as_str())),
        regencies: distinct(records.iter().map(|r| r.regency.as_str())),
        districts: distinct(records.iter().map(|r| r.district.as_str())),
        villages: distinct(records.iter().map(|r| r.village.as_str())),
        missing: table.missing.clone(),
    };

    let target = summarize_target(&incidents, stats);
    let temporal = temporal_trends(table);
    let hotspots = geographic_hotspots(table);
    let insights = derive_insights(&temporal, &hotspots, stats.mean * stats.count as f64)?;
    tracing::info!(
        "Explored {} records: {:.2}% with cases across {} regencies",
        overview.total_records,
        target.non_zero_pct,
        overview.regencies
    );
    Some(Exploration {
        overview,
        target,
        temporal,
        hotspots,
        insights,
    })
}

fn distinct<T: Ord>(items: impl Iterator<Item = T>) -> usize {
    items.collect::<BTreeSet<_>>().len()
}

fn summarize_target(incidents: &[f64], stats: DescriptiveStats) -> TargetSummary {
    let mut sorted = incidents.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for value in sorted {
        match counts.last_mut() {
            Some((last, count)) if *last == value => *count += 1,
            _ => counts.push((value, 1)),
        }
    }
    // Stable sort keeps ascending values among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(TOP_VALUE_COUNTS);

    let non_zero: Vec<f64> = incidents.iter().copied().filter(|&v| v > 0.0).collect();
    let total = incidents.len();
    let zero_count = total - non_zero.len();
    TargetSummary {
        stats,
        top_values: counts,
        zero_count,
        non_zero_count: non_zero.len(),
        zero_pct: percent(zero_count, total),
        non_zero_pct: percent(non_zero.len(), total),
        imbalance_ratio: (!non_zero.is_empty())
            .then(|| zero_count as f64 / non_zero.len() as f64),
        non_zero_median: median(&non_zero),
    }
}

#[derive(Default)]
struct GroupStats {
    total: f64,
    max: f64,
    rows: usize,
    with_cases: usize,
}

impl GroupStats {
    fn push(&mut self, value: f64) {
        if self.rows == 0 || value > self.max {
            self.max = value;
        }
        self.total += value;
        self.rows += 1;
        if value > 0.0 {
            self.with_cases += 1;
        }
    }

    fn mean(&self) -> f64 {
        self.total / self.rows.max(1) as f64
    }
}

/// Per-year totals in ascending year order.
pub fn temporal_trends(table: &IncidentTable) -> Vec<YearTrend> {
    let mut groups: BTreeMap<i32, GroupStats> = BTreeMap::new();
    for record in &table.records {
        groups.entry(record.year).or_default().push(record.incidents);
    }
    groups
        .into_iter()
        .map(|(year, group)| YearTrend {
            year,
            total_cases: group.total,
            mean_cases: group.mean(),
            record_count: group.rows,
            pct_with_cases: percent(group.with_cases, group.rows),
        })
        .collect()
}

/// Per-regency totals, highest total first.
pub fn geographic_hotspots(table: &IncidentTable) -> Vec<RegencyHotspot> {
    let mut groups: BTreeMap<&str, GroupStats> = BTreeMap::new();
    for record in &table.records {
        groups
            .entry(record.regency.as_str())
            .or_default()
            .push(record.incidents);
    }
    let mut hotspots: Vec<RegencyHotspot> = groups
        .into_iter()
        .map(|(regency, group)| RegencyHotspot {
            regency: regency.to_string(),
            total_cases: group.total,
            mean_cases: round_to(group.mean(), 2),
            max_cases: group.max,
            village_rows: group.rows,
            pct_with_cases: round_to(percent(group.with_cases, group.rows), 2),
        })
        .collect();
    hotspots.sort_by(|a, b| b.total_cases.total_cmp(&a.total_cases));
    hotspots
}

fn derive_insights(
    temporal: &[YearTrend],
    hotspots: &[RegencyHotspot],
    total_cases: f64,
) -> Option<ExploreInsights> {
    let top = &hotspots[..hotspots.len().min(TOP_HOTSPOTS)];
    let top_total: f64 = top.iter().map(|h| h.total_cases).sum();
    let mut peak = temporal.first()?;
    for trend in temporal {
        if trend.total_cases > peak.total_cases {
            peak = trend;
        }
    }
    let first = temporal.first()?;
    let last = temporal.last()?;
    Some(ExploreInsights {
        top_regencies: top.iter().map(|h| h.regency.clone()).collect(),
        top_share_pct: if total_cases > 0.0 {
            top_total / total_cases * 100.0
        } else {
            0.0
        },
        peak_year: peak.year,
        trend: if last.total_cases > first.total_cases {
            Trend::Increasing
        } else {
            Trend::Decreasing
        },
    })
}

#[derive(Debug, Serialize)]
struct DatasetSummaryRow<'a> {
    total_records: usize,
    period: String,
    regency_count: usize,
    zero_cases_pct: f64,
    with_cases_pct: f64,
    imbalance_ratio: String,
    top_regencies: String,
    max_cases: f64,
    median_cases_non_zero: Option<f64>,
    trend: &'a str,
}

impl CsvRecord for DatasetSummaryRow<'_> {
    const COLUMNS: &'static [&'static str] = &[
        "total_records",
        "period",
        "regency_count",
        "zero_cases_pct",
        "with_cases_pct",
        "imbalance_ratio",
        "top_regencies",
        "max_cases",
        "median_cases_non_zero",
        "trend",
    ];
}

fn ratio_label(ratio: Option<f64>) -> String {
    ratio.map(|r| format!("{r:.1}:1")).unwrap_or_default()
}

/// Full text report of the exploration.
pub fn render_summary(exploration: &Exploration, criteria: &SuccessCriteria) -> String {
    let Exploration {
        overview,
        target,
        temporal,
        hotspots,
        insights,
    } = exploration;
    let rule = "=".repeat(70);
    let mut out = String::new();
    let _ = writeln!(out, "REGIONAL RISK CLASSIFICATION - BUSINESS UNDERSTANDING");
    let _ = writeln!(out, "{rule}\n");
    let _ = writeln!(out, "PROBLEM STATEMENT:");
    let _ = writeln!(
        out,
        "Identify regions likely to record incidents so prevention resources can be targeted."
    );
    let _ = writeln!(out, "Target: \"At risk\" (cases > 0) vs \"Not at risk\" (no cases).\n");
    let _ = writeln!(out, "SUCCESS CRITERIA:");
    let _ = writeln!(out, "- Precision >= {:.0}%", criteria.min_precision * 100.0);
    let _ = writeln!(out, "- Recall >= {:.0}%", criteria.min_recall * 100.0);
    let _ = writeln!(out, "- F1-Score >= {:.0}%", criteria.min_f1 * 100.0);
    let _ = writeln!(out, "- ROC-AUC >= {:.2}\n", criteria.min_roc_auc);

    let _ = writeln!(out, "DATASET OVERVIEW:");
    let _ = writeln!(out, "- Records: {}", overview.total_records);
    let _ = writeln!(
        out,
        "- Period: {}-{} ({} years)",
        overview.year_min, overview.year_max, overview.distinct_years
    );
    let _ = writeln!(out, "- Provinces: {}", overview.provinces);
    let _ = writeln!(out, "- Regencies/cities: {}", overview.regencies);
    let _ = writeln!(out, "- Districts: {}", overview.districts);
    let _ = writeln!(out, "- Villages: {}", overview.villages);
    if overview.missing.is_clean() {
        let _ = writeln!(out, "- Missing values: none");
    } else {
        let _ = writeln!(
            out,
            "- Rows dropped for missing values: {}",
            overview.missing.dropped_rows
        );
        for (column, count) in overview.missing.per_column.iter().filter(|(_, c)| **c > 0) {
            let _ = writeln!(out, "    {column}: {count}");
        }
    }

    let s = &target.stats;
    let _ = writeln!(out, "\nTARGET STATISTICS:");
    let _ = writeln!(
        out,
        "count={} mean={:.4} std={:.4} min={} 25%={} 50%={} 75%={} max={}",
        s.count, s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max
    );
    let _ = writeln!(out, "\nMost frequent values:");
    for (value, count) in &target.top_values {
        let _ = writeln!(out, "  {value:>6}  {count}");
    }

    let _ = writeln!(out, "\nTemporal trends:");
    let _ = writeln!(out, "  year     sum      mean   count  %with_cases");
    for t in temporal {
        let _ = writeln!(
            out,
            "  {}  {:>6}  {:>8.4}  {:>6}  {:>10.2}",
            t.year, t.total_cases, t.mean_cases, t.record_count, t.pct_with_cases
        );
    }
    let _ = writeln!(out, "\nTop 10 regencies:");
    for h in hotspots.iter().take(10) {
        let _ = writeln!(
            out,
            "  {:<32} total={} mean={:.2} max={} rows={} with_cases={:.2}%",
            h.regency, h.total_cases, h.mean_cases, h.max_cases, h.village_rows, h.pct_with_cases
        );
    }

    let _ = writeln!(out, "\nKEY INSIGHTS:\n");
    let _ = writeln!(out, "1. CLASS IMBALANCE");
    let _ = writeln!(out, "   - {:.2}% of rows have no cases (class 0)", target.zero_pct);
    let _ = writeln!(out, "   - {:.2}% of rows have cases (class 1)", target.non_zero_pct);
    match target.imbalance_ratio {
        Some(ratio) => {
            let _ = writeln!(out, "   - Imbalance ratio: {}", ratio_label(Some(ratio)));
        }
        None => {
            let _ = writeln!(out, "   - Imbalance ratio: undefined (no rows with cases)");
        }
    }
    let _ = writeln!(
        out,
        "   Accuracy is misleading here; compare precision, recall, F1 and ROC-AUC."
    );
    let _ = writeln!(out, "\n2. GEOGRAPHIC CONCENTRATION");
    let _ = writeln!(out, "   - Top regencies: {}", insights.top_regencies.join(", "));
    let _ = writeln!(
        out,
        "   - They account for {:.1}% of all cases",
        insights.top_share_pct
    );
    let _ = writeln!(out, "\n3. TEMPORAL PATTERNS");
    let _ = writeln!(out, "   - Peak year: {}", insights.peak_year);
    let _ = writeln!(out, "   - Trend: {}", insights.trend.label());
    let _ = writeln!(out, "\n4. DATA SPARSITY");
    match target.non_zero_median {
        Some(value) => {
            let _ = writeln!(out, "   - Median cases (when > 0): {value:.0}");
        }
        None => {
            let _ = writeln!(out, "   - Median cases (when > 0): n/a");
        }
    }
    let _ = writeln!(out, "   - Max cases: {}", s.max);
    out
}

/// Write the CSV tables and text summary into `dir`.
pub fn write_exploration(
    dir: &Path,
    exploration: &Exploration,
    criteria: &SuccessCriteria,
) -> Result<Vec<PathBuf>, ExportError> {
    let temporal_path = dir.join(TEMPORAL_TRENDS_FILE);
    write_rows(&temporal_path, &exploration.temporal)?;
    let hotspots_path = dir.join(HOTSPOTS_FILE);
    write_rows(&hotspots_path, &exploration.hotspots)?;

    let overview = &exploration.overview;
    let target = &exploration.target;
    let row = DatasetSummaryRow {
        total_records: overview.total_records,
        period: format!("{}-{}", overview.year_min, overview.year_max),
        regency_count: overview.regencies,
        zero_cases_pct: round_to(target.zero_pct, 4),
        with_cases_pct: round_to(target.non_zero_pct, 4),
        imbalance_ratio: ratio_label(target.imbalance_ratio),
        top_regencies: exploration.insights.top_regencies.join("; "),
        max_cases: target.stats.max,
        median_cases_non_zero: target.non_zero_median,
        trend: exploration.insights.trend.label(),
    };
    let summary_path = dir.join(DATASET_SUMMARY_FILE);
    write_rows(&summary_path, &[row])?;
    let text_path = dir.join(BUSINESS_SUMMARY_FILE);
    write_text(&text_path, &render_summary(exploration, criteria))?;
    Ok(vec![temporal_path, hotspots_path, summary_path, text_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::IncidentRecord;

    fn record(regency: &str, village: &str, incidents: f64, year: i32) -> IncidentRecord {
        IncidentRecord {
            province: "JAWA BARAT".into(),
            regency: regency.into(),
            district: format!("{regency} D"),
            village: village.into(),
            incidents,
            year,
        }
    }

    fn table() -> IncidentTable {
        IncidentTable {
            records: vec![
                record("BOGOR", "A", 0.0, 2019),
                record("BOGOR", "B", 2.0, 2019),
                record("BANDUNG", "C", 0.0, 2019),
                record("GARUT", "E", 0.0, 2019),
                record("BOGOR", "A", 3.0, 2020),
                record("BANDUNG", "C", 1.0, 2020),
                record("BANDUNG", "D", 0.0, 2020),
                record("GARUT", "E", 0.0, 2020),
            ],
            missing: MissingValueReport::default(),
            headers: Vec::new(),
        }
    }

    #[test]
    fn describes_target_distribution() {
        let exploration = explore_incidents(&table()).unwrap();
        let target = &exploration.target;
        assert_eq!(target.stats.count, 8);
        assert_eq!(target.stats.mean, 0.75);
        assert_eq!(target.stats.q75, 1.25);
        assert_eq!(target.zero_count, 5);
        assert_eq!(target.non_zero_count, 3);
        assert_eq!(target.zero_pct, 62.5);
        assert!((target.imbalance_ratio.unwrap() - 5.0 / 3.0).abs() < 1e-12);
        assert_eq!(target.non_zero_median, Some(2.0));
        assert_eq!(target.top_values[0], (0.0, 5));
        assert_eq!(target.top_values[1], (1.0, 1));

        let overview = &exploration.overview;
        assert_eq!((overview.year_min, overview.year_max), (2019, 2020));
        assert_eq!(overview.regencies, 3);
        assert_eq!(overview.villages, 5);
    }

    #[test]
    fn overview_counts_names_shared_across_regencies_once() {
        let shared = |regency: &str, incidents: f64| IncidentRecord {
            province: "JAWA BARAT".into(),
            regency: regency.into(),
            district: "CIBADAK".into(),
            village: "SUKAMAJU".into(),
            incidents,
            year: 2021,
        };
        let table = IncidentTable {
            records: vec![shared("KABUPATEN BOGOR", 0.0), shared("KABUPATEN SUKABUMI", 1.0)],
            missing: MissingValueReport::default(),
            headers: Vec::new(),
        };
        let overview = explore_incidents(&table).unwrap().overview;
        assert_eq!(overview.regencies, 2);
        assert_eq!(overview.districts, 1);
        assert_eq!(overview.villages, 1);
    }

    #[test]
    fn trends_and_hotspots() {
        let exploration = explore_incidents(&table()).unwrap();
        assert_eq!(exploration.temporal.len(), 2);
        assert_eq!(exploration.temporal[0].total_cases, 2.0);
        assert_eq!(exploration.temporal[0].pct_with_cases, 25.0);
        assert_eq!(exploration.temporal[1].total_cases, 4.0);

        let first = &exploration.hotspots[0];
        assert_eq!(first.regency, "BOGOR");
        assert_eq!(first.total_cases, 5.0);
        assert_eq!(first.mean_cases, 1.67);
        assert_eq!(first.pct_with_cases, 66.67);

        let insights = &exploration.insights;
        assert_eq!(insights.peak_year, 2020);
        assert_eq!(insights.trend, Trend::Increasing);
        assert_eq!(insights.top_regencies, vec!["BOGOR", "BANDUNG", "GARUT"]);
        assert_eq!(insights.top_share_pct, 100.0);
    }

    #[test]
    fn no_cases_leaves_ratio_undefined() {
        let mut table = table();
        for record in &mut table.records {
            record.incidents = 0.0;
        }
        let exploration = explore_incidents(&table).unwrap();
        assert_eq!(exploration.target.imbalance_ratio, None);
        assert_eq!(exploration.target.non_zero_median, None);
        assert_eq!(exploration.insights.trend, Trend::Decreasing);
        assert!(render_summary(&exploration, &SuccessCriteria::default()).contains("undefined"));
    }

    #[test]
    fn writes_every_output() {
        let dir = tempfile::tempdir().unwrap();
        let exploration = explore_incidents(&table()).unwrap();
        let written =
            write_exploration(dir.path(), &exploration, &SuccessCriteria::default()).unwrap();
        assert_eq!(written.len(), 4);
        let summary = std::fs::read_to_string(dir.path().join(DATASET_SUMMARY_FILE)).unwrap();
        assert!(summary.starts_with("total_records,period,"));
        assert!(summary.contains("2019-2020"));
        assert!(summary.contains("1.7:1"));
        let hotspots = std::fs::read_to_string(dir.path().join(HOTSPOTS_FILE)).unwrap();
        assert!(hotspots.lines().nth(1).unwrap().starts_with("BOGOR,5.0,"));
    }

    #[test]
    fn row_columns_match_serialized_fields() {
        use crate::dataset::export::derived_header;

        let exploration = explore_incidents(&table()).unwrap();
        assert_eq!(derived_header(&exploration.temporal[0]), YearTrend::COLUMNS.join(","));
        assert_eq!(derived_header(&exploration.hotspots[0]), RegencyHotspot::COLUMNS.join(","));
        let row = DatasetSummaryRow {
            total_records: 1,
            period: "2019-2019".into(),
            regency_count: 1,
            zero_cases_pct: 0.0,
            with_cases_pct: 100.0,
            imbalance_ratio: String::new(),
            top_regencies: "BOGOR".into(),
            max_cases: 1.0,
            median_cases_non_zero: Some(1.0),
            trend: "Increasing",
        };
        assert_eq!(derived_header(&row), DatasetSummaryRow::COLUMNS.join(","));
    }

    #[test]
    fn empty_trend_table_keeps_its_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TEMPORAL_TRENDS_FILE);
        write_rows::<YearTrend>(&path, &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "year,total_cases,mean_cases,record_count,pct_with_cases\n");
    }
}
