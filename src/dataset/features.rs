//! Feature engineering over regency-year aggregates.
//!
//! Produces the fixed 18-column model input plus the binary `at_risk`
//! target. Temporal columns are positional within each regency's
//! year-ordered history, so a gap year still counts as "the previous row".

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::aggregate::{RegencyYear, aggregate_by_regency_year, historical_totals};
use super::loader::IncidentRecord;

/// Number of model input columns.
pub const FEATURE_COUNT: usize = 18;

/// Model input column names, in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "year",
    "cases_lag_1y",
    "cases_lag_2y",
    "trend",
    "growth_rate",
    "rolling_mean_2y",
    "rolling_max_2y",
    "regency_code",
    "district_count",
    "village_count",
    "cases_per_village",
    "density_score",
    "historical_total",
    "mean_cases",
    "max_cases",
    "std_cases",
    "severity_ratio",
    "record_count",
];

/// Class labels in index order.
pub const CLASS_NAMES: [&str; 2] = ["Not at risk", "At risk"];

/// Grouping used when summarizing feature importance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureCategory {
    Temporal,
    Geographic,
    Statistical,
}

impl FeatureCategory {
    pub const ALL: [FeatureCategory; 3] = [Self::Temporal, Self::Geographic, Self::Statistical];

    /// Category of a model column, `None` for unknown names.
    pub fn of(name: &str) -> Option<Self> {
        let idx = FEATURE_NAMES.iter().position(|n| *n == name)?;
        Some(match idx {
            0..=6 => Self::Temporal,
            7..=12 => Self::Geographic,
            _ => Self::Statistical,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Temporal => "Temporal",
            Self::Geographic => "Geographic",
            Self::Statistical => "Statistical",
        }
    }
}

/// Model input for one regency-year, field order matching [`FEATURE_NAMES`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub year: f64,
    pub cases_lag_1y: f64,
    pub cases_lag_2y: f64,
    pub trend: f64,
    pub growth_rate: f64,
    pub rolling_mean_2y: f64,
    pub rolling_max_2y: f64,
    pub regency_code: f64,
    pub district_count: f64,
    pub village_count: f64,
    pub cases_per_village: f64,
    pub density_score: f64,
    pub historical_total: f64,
    pub mean_cases: f64,
    pub max_cases: f64,
    pub std_cases: f64,
    pub severity_ratio: f64,
    pub record_count: f64,
}

impl Features {
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.year,
            self.cases_lag_1y,
            self.cases_lag_2y,
            self.trend,
            self.growth_rate,
            self.rolling_mean_2y,
            self.rolling_max_2y,
            self.regency_code,
            self.district_count,
            self.village_count,
            self.cases_per_village,
            self.density_score,
            self.historical_total,
            self.mean_cases,
            self.max_cases,
            self.std_cases,
            self.severity_ratio,
            self.record_count,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.to_vec().iter().all(|v| v.is_finite())
    }
}

/// Engineered row with the identifiers needed for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub regency: String,
    pub total_cases: f64,
    pub features: Features,
    pub at_risk: bool,
}

impl FeatureRow {
    pub fn label(&self) -> usize {
        usize::from(self.at_risk)
    }
}

/// Label encoding of regency names, codes assigned in sorted name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegencyEncoder {
    /// Names in code order.
    classes: Vec<String>,
    codes: BTreeMap<String, usize>,
}

impl RegencyEncoder {
    pub fn fit<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let set: BTreeSet<&str> = names.into_iter().collect();
        let classes: Vec<String> = set.into_iter().map(str::to_string).collect();
        let codes = classes
            .iter()
            .enumerate()
            .map(|(code, name)| (name.clone(), code))
            .collect();
        Self { classes, codes }
    }

    /// Rebuild from `(name, code)` pairs read back from disk.
    pub fn from_pairs(mut pairs: Vec<(String, usize)>) -> Result<Self, String> {
        pairs.sort_by_key(|(_, code)| *code);
        for (expected, (name, code)) in pairs.iter().enumerate() {
            if *code != expected {
                return Err(format!(
                    "regency mapping is not contiguous: {name} has code {code}, expected {expected}"
                ));
            }
        }
        let mut codes = BTreeMap::new();
        for (name, code) in &pairs {
            if codes.insert(name.clone(), *code).is_some() {
                return Err(format!("regency mapping lists {name} more than once"));
            }
        }
        Ok(Self {
            classes: pairs.into_iter().map(|(name, _)| name).collect(),
            codes,
        })
    }

    pub fn encode(&self, name: &str) -> Option<usize> {
        self.codes.get(name).copied()
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Output of feature engineering.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
    pub encoder: RegencyEncoder,
    /// Regency-year groups before non-finite rows were removed.
    pub aggregated_rows: usize,
    pub dropped_non_finite: usize,
}

impl FeatureTable {
    /// `(not at risk, at risk)` row counts.
    pub fn class_counts(&self) -> (usize, usize) {
        let positive = self.rows.iter().filter(|row| row.at_risk).count();
        (self.rows.len() - positive, positive)
    }

    pub fn matrix(&self) -> (Vec<Vec<f64>>, Vec<usize>) {
        let x = self.rows.iter().map(|row| row.features.to_vec()).collect();
        let y = self.rows.iter().map(FeatureRow::label).collect();
        (x, y)
    }
}

/// Aggregate raw records and derive every model feature.
pub fn build_feature_table(records: &[IncidentRecord]) -> FeatureTable {
    let groups = aggregate_by_regency_year(records);
    let history = historical_totals(records);
    let encoder = RegencyEncoder::fit(groups.iter().map(|g| g.regency.as_str()));

    let mut rows = Vec::with_capacity(groups.len());
    let mut previous: Option<&str> = None;
    let mut lag_1: Option<f64> = None;
    let mut lag_2: Option<f64> = None;
    for group in &groups {
        if previous != Some(group.regency.as_str()) {
            previous = Some(group.regency.as_str());
            lag_1 = None;
            lag_2 = None;
        }
        let historical = history.get(&group.regency).copied().unwrap_or(0.0);
        let code = encoder.encode(&group.regency).unwrap_or(0);
        rows.push(engineer(group, lag_1, lag_2, historical, code));
        lag_2 = lag_1;
        lag_1 = Some(group.total_cases);
    }

    let aggregated_rows = rows.len();
    rows.retain(|row| row.features.is_finite());
    let dropped_non_finite = aggregated_rows - rows.len();
    if dropped_non_finite > 0 {
        tracing::warn!("Dropped {dropped_non_finite} regency-year rows with non-finite features");
    }
    FeatureTable {
        rows,
        encoder,
        aggregated_rows,
        dropped_non_finite,
    }
}

fn engineer(
    group: &RegencyYear,
    lag_1: Option<f64>,
    lag_2: Option<f64>,
    historical_total: f64,
    regency_code: usize,
) -> FeatureRow {
    let total = group.total_cases;
    let trend = lag_1.map_or(0.0, |prev| total - prev);
    let growth_rate = match lag_1 {
        Some(prev) if prev > 0.0 => (total - prev) / prev * 100.0,
        _ => 0.0,
    };
    let (rolling_mean, rolling_max) = match lag_1 {
        Some(prev) => ((total + prev) / 2.0, total.max(prev)),
        None => (total, total),
    };
    let severity_ratio = if group.mean_cases > 0.0 {
        group.max_cases / group.mean_cases
    } else {
        0.0
    };

    FeatureRow {
        regency: group.regency.clone(),
        total_cases: total,
        at_risk: total > 0.0,
        features: Features {
            year: f64::from(group.year),
            cases_lag_1y: lag_1.unwrap_or(0.0),
            cases_lag_2y: lag_2.unwrap_or(0.0),
            trend,
            growth_rate,
            rolling_mean_2y: rolling_mean,
            rolling_max_2y: rolling_max,
            regency_code: regency_code as f64,
            district_count: group.district_count as f64,
            village_count: group.village_count as f64,
            cases_per_village: total / group.village_count as f64,
            density_score: total / group.district_count as f64,
            historical_total,
            mean_cases: group.mean_cases,
            max_cases: group.max_cases,
            std_cases: group.std_cases,
            severity_ratio,
            record_count: group.record_count as f64,
        },
    }
}
